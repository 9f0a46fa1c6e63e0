//! S3-compatible backend.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::DateTime;

use super::{Object, ObjectMeta, ObjectStore, StorageError};
use crate::config::StorageConfig;

/// Object store backed by an S3-compatible bucket.
///
/// The configured path acts as a key prefix inside the bucket. Directories
/// are modeled as key prefixes: listing a prefix reports its immediate
/// children (objects plus pseudo-directories), deleting one removes every
/// object underneath it.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    pub async fn new(cfg: &StorageConfig) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                cfg.access_key_id.clone(),
                cfg.secret_access_key.clone(),
                None,
                None,
                "remora-config",
            ))
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base).force_path_style(true);
        if !cfg.endpoint.is_empty() {
            builder = builder.endpoint_url(&cfg.endpoint);
        }
        Self {
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            prefix: cfg.path.trim_matches('/').to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        let key = key.trim_matches('/');
        if self.prefix.is_empty() {
            key.to_string()
        } else if key.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn relative(&self, full: &str) -> String {
        let trimmed = full.trim_end_matches('/');
        if self.prefix.is_empty() {
            trimmed.to_string()
        } else {
            trimmed
                .strip_prefix(self.prefix.as_str())
                .map(|s| s.trim_start_matches('/'))
                .unwrap_or(trimmed)
                .to_string()
        }
    }

    async fn head_meta(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        let full = self.full_key(key);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&full)
            .send()
            .await
        {
            Ok(head) => Ok(Some(ObjectMeta {
                path: key.trim_matches('/').to_string(),
                size: head.content_length().unwrap_or(0).max(0) as u64,
                last_modified: head
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
            })),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(None)
                } else {
                    Err(StorageError::s3(service.to_string()))
                }
            }
        }
    }

    /// Immediate children of a prefix, objects and pseudo-directories.
    async fn list_children(&self, key: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let full = format!("{}/", self.full_key(key));
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full)
                .delimiter("/");
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| StorageError::s3(e.to_string()))?;

            for object in resp.contents() {
                let Some(k) = object.key() else { continue };
                entries.push(ObjectMeta {
                    path: self.relative(k),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }
            for dir in resp.common_prefixes() {
                if let Some(p) = dir.prefix() {
                    entries.push(ObjectMeta {
                        path: self.relative(p),
                        size: 0,
                        last_modified: None,
                    });
                }
            }

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(entries)
    }

    /// Every object key underneath a prefix, recursively.
    async fn keys_under(&self, key: &str) -> Result<Vec<String>, StorageError> {
        let full = format!("{}/", self.full_key(key));
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| StorageError::s3(e.to_string()))?;
            keys.extend(resp.contents().iter().filter_map(|o| o.key().map(String::from)));
            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_meta(&self, key: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        if let Some(meta) = self.head_meta(key).await? {
            return Ok(vec![meta]);
        }
        let children = self.list_children(key).await?;
        if children.is_empty() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(children)
    }

    async fn list(&self, key: &str) -> Result<Vec<Object>, StorageError> {
        let metas = self.list_meta(key).await?;
        let mut objects = Vec::new();
        for meta in metas {
            if meta.size == 0 && meta.last_modified.is_none() {
                // Pseudo-directory entry.
                continue;
            }
            let object = self.get(&meta.path).await?;
            objects.push(object);
        }
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Object, StorageError> {
        let full = self.full_key(key);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::s3(service.to_string())
                }
            })?;
        let last_modified = resp
            .last_modified()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
        let content = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::s3(e.to_string()))?
            .into_bytes()
            .to_vec();
        Ok(Object {
            meta: ObjectMeta {
                path: key.trim_matches('/').to_string(),
                size: content.len() as u64,
                last_modified,
            },
            content,
        })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::s3(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.head_meta(key).await?.is_some() {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(self.full_key(key))
                .send()
                .await
                .map_err(|e| StorageError::s3(e.to_string()))?;
            return Ok(());
        }

        let keys = self.keys_under(key).await?;
        if keys.is_empty() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        for full in keys {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&full)
                .send()
                .await
                .map_err(|e| StorageError::s3(e.to_string()))?;
        }
        Ok(())
    }
}
