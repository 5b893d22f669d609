//! Paginated object-store listing with include/exclude filters and
//! subprefix discovery (C2, §4.2).
//!
//! The lister is generic over an [`ObjectStore`] trait so the rest of the
//! core never names an S3 SDK type directly. [`S3ObjectStore`] is the
//! production binding; tests back onto an in-memory fake defined below.

use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::error::ObjectStoreError;

/// One object returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
    pub size: Option<i64>,
    pub etag: Option<String>,
}

/// One page of a `ListObjectsV2`-style paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    /// Populated only when a `delimiter` was supplied.
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

/// A backend capable of paginated, delimiter-aware object listing.
///
/// Implementors are not expected to retry on failure (§4.2): errors surface
/// directly to the caller.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, ObjectStoreError>;
}

/// Production [`ObjectStore`] backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

/// Environment-driven S3 client configuration (§6, §10.3).
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl S3Config {
    /// Read `AWS_REGION`, `AWS_ENDPOINT_URL`, and `AWS_S3_FORCE_PATH_STYLE`
    /// from the environment. Credentials (`AWS_ACCESS_KEY_ID` /
    /// `AWS_SECRET_ACCESS_KEY`) are left to `aws-config`'s own default
    /// credential chain.
    pub fn from_env() -> Self {
        Self {
            region: std::env::var("AWS_REGION").ok(),
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok(),
            force_path_style: std::env::var("AWS_S3_FORCE_PATH_STYLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl S3ObjectStore {
    /// Build a client from [`S3Config`], resolving credentials through
    /// `aws-config`'s default provider chain.
    pub async fn new(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared_config = loader.load().await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            s3_builder = s3_builder.endpoint_url(endpoint.clone());
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, ObjectStoreError> {
        let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(delim) = delimiter {
            request = request.delimiter(delim);
        }
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let output = request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        let objects = output
            .contents()
            .iter()
            .map(|obj| ObjectSummary {
                bucket: bucket.to_string(),
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size(),
                etag: obj.e_tag().map(str::to_string),
            })
            .collect();

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(str::to_string)
            .collect();

        let next_token = output
            .is_truncated()
            .unwrap_or(false)
            .then(|| output.next_continuation_token().map(str::to_string))
            .flatten();

        Ok(ObjectPage {
            objects,
            common_prefixes,
            next_token,
        })
    }
}

/// Either an object or a page's common-prefix markers (non-recursive mode).
#[derive(Debug, Clone)]
pub enum ListedItem {
    Object(ObjectSummary),
    CommonPrefixes(Vec<String>),
}

/// Include/exclude glob matching, shared by the object lister.
pub(crate) fn build_filter(patterns: &[String]) -> Result<GlobSet, ObjectStoreError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ObjectStoreError::Request(format!("invalid glob `{pattern}`: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ObjectStoreError::Request(e.to_string()))
}

fn key_matches(key: &str, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    if let Some(include) = include {
        if !include.is_match(key) {
            return false;
        }
    }
    if let Some(exclude) = exclude {
        if exclude.is_match(key) {
            return false;
        }
    }
    true
}

/// Streaming lister built atop an [`ObjectStore`].
pub struct Lister {
    store: Arc<dyn ObjectStore>,
}

impl Lister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Stream objects under `prefix`, applying include/exclude globs and an
    /// optional hard cap. Non-recursive listings also yield one
    /// [`ListedItem::CommonPrefixes`] marker per page.
    pub fn stream_objects(
        &self,
        bucket: String,
        prefix: String,
        recursive: bool,
        include: Vec<String>,
        exclude: Vec<String>,
        max_files: Option<usize>,
    ) -> impl Stream<Item = Result<ListedItem, ObjectStoreError>> + '_ {
        try_stream! {
            let include_set = (!include.is_empty()).then(|| build_filter(&include)).transpose()?;
            let exclude_set = (!exclude.is_empty()).then(|| build_filter(&exclude)).transpose()?;
            let delimiter = (!recursive).then_some("/");

            let mut token: Option<String> = None;
            let mut emitted = 0usize;

            loop {
                let page = self
                    .store
                    .list_page(&bucket, &prefix, delimiter, token.clone())
                    .await?;

                for object in page.objects {
                    if let Some(max) = max_files {
                        if emitted >= max {
                            return;
                        }
                    }
                    if key_matches(&object.key, include_set.as_ref(), exclude_set.as_ref()) {
                        emitted += 1;
                        yield ListedItem::Object(object);
                    }
                }

                if !recursive && !page.common_prefixes.is_empty() {
                    yield ListedItem::CommonPrefixes(page.common_prefixes);
                }

                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
        }
    }

    /// Breadth-first expand `base_prefix`'s common-prefix children `depth`
    /// times. Every level is paginated to completion before moving on —
    /// unlike a naive single-page BFS, this threads the continuation token
    /// fully at each level (§9, open question 4).
    pub async fn list_prefixes_at_depth(
        &self,
        bucket: &str,
        base_prefix: &str,
        depth: u32,
    ) -> Result<Vec<String>, ObjectStoreError> {
        let mut frontier = vec![base_prefix.to_string()];

        for level in 0..depth {
            let mut children = Vec::new();
            for prefix in &frontier {
                children.extend(self.list_all_common_prefixes(bucket, prefix).await?);
            }

            if children.is_empty() {
                debug!(level, "no children at this level, keeping previous frontier");
                break;
            }
            frontier = children;
        }

        Ok(frontier)
    }

    async fn list_all_common_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, ObjectStoreError> {
        let mut prefixes = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_page(bucket, prefix, Some("/"), token.clone())
                .await?;
            prefixes.extend(page.common_prefixes);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(prefixes)
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use std::collections::BTreeSet;

    /// In-memory [`ObjectStore`] fake: a flat, sorted key set with a fixed
    /// page size, used to exercise pagination and filtering without a real
    /// bucket.
    pub struct InMemoryStore {
        keys: BTreeSet<String>,
        page_size: usize,
    }

    impl InMemoryStore {
        pub fn new(keys: impl IntoIterator<Item = impl Into<String>>, page_size: usize) -> Self {
            Self {
                keys: keys.into_iter().map(Into::into).collect(),
                page_size,
            }
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryStore {
        async fn list_page(
            &self,
            bucket: &str,
            prefix: &str,
            delimiter: Option<&str>,
            continuation_token: Option<String>,
        ) -> Result<ObjectPage, ObjectStoreError> {
            let start = continuation_token.unwrap_or_default();
            let matches: Vec<&String> = self
                .keys
                .iter()
                .filter(|k| k.starts_with(prefix) && k.as_str() > start.as_str())
                .collect();

            // Collapse consecutive keys under the same common prefix into a
            // single entry, mirroring S3's delimiter semantics: a shared
            // prefix counts once against the page size regardless of how
            // many keys sit beneath it.
            enum Entry<'a> {
                Object(&'a String),
                Prefix(String, &'a String),
            }

            let mut entries: Vec<Entry> = Vec::new();
            for key in &matches {
                if let Some(delim) = delimiter {
                    let rest = &key[prefix.len()..];
                    if let Some(idx) = rest.find(delim) {
                        let grouped = format!("{prefix}{}", &rest[..idx + delim.len()]);
                        if let Some(Entry::Prefix(last, last_key)) = entries.last_mut() {
                            if *last == grouped {
                                *last_key = key;
                                continue;
                            }
                        }
                        entries.push(Entry::Prefix(grouped, key));
                        continue;
                    }
                }
                entries.push(Entry::Object(key));
            }

            let mut objects = Vec::new();
            let mut common_prefixes = Vec::new();
            let mut next_token = None;

            for (i, entry) in entries.iter().enumerate() {
                if i >= self.page_size {
                    next_token = Some(
                        match &entries[i - 1] {
                            Entry::Object(k) => (*k).clone(),
                            Entry::Prefix(_, k) => (*k).clone(),
                        },
                    );
                    break;
                }

                match entry {
                    Entry::Object(key) => objects.push(ObjectSummary {
                        bucket: bucket.to_string(),
                        key: (*key).clone(),
                        size: Some(0),
                        etag: None,
                    }),
                    Entry::Prefix(p, _) => common_prefixes.push(p.clone()),
                }
            }

            Ok(ObjectPage {
                objects,
                common_prefixes,
                next_token,
            })
        }
    }
}
