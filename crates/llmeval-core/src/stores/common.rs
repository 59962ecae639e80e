//! Versions and tags shared by the dataset screens.

use std::future::Future;

use anyhow::Result;
use tracing::{debug, error};

use crate::api::ApiClient;
use crate::models::{SelectOption, Tag, Version};

/// Where the common store loads versions and tags from.
pub trait DatasetSource {
    fn list_versions(&self) -> impl Future<Output = Result<Vec<Version>>>;
    fn list_tags(&self) -> impl Future<Output = Result<Vec<Tag>>>;
    fn create_version(&self, version: &str) -> impl Future<Output = Result<Version>>;
    fn create_tag(&self, tag: &str) -> impl Future<Output = Result<Tag>>;
}

impl DatasetSource for ApiClient {
    async fn list_versions(&self) -> Result<Vec<Version>> {
        self.versions().list().await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.tags().list().await
    }

    async fn create_version(&self, version: &str) -> Result<Version> {
        self.versions().create(version).await
    }

    async fn create_tag(&self, tag: &str) -> Result<Tag> {
        self.tags().create(tag).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub versions: bool,
    pub tags: bool,
}

pub struct CommonStore<D> {
    source: D,
    versions: Vec<Version>,
    tags: Vec<Tag>,
    loading: LoadingState,
}

impl<D: DatasetSource> CommonStore<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            versions: Vec::new(),
            tags: Vec::new(),
            loading: LoadingState::default(),
        }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn loading(&self) -> LoadingState {
        self.loading
    }

    pub fn version_options(&self) -> Vec<SelectOption> {
        self.versions.iter().map(SelectOption::from).collect()
    }

    pub fn tag_options(&self) -> Vec<SelectOption> {
        self.tags.iter().map(SelectOption::from).collect()
    }

    /// Reload versions. A failed fetch is logged and the previous list kept.
    pub async fn fetch_versions(&mut self) {
        self.loading.versions = true;
        let result = self.source.list_versions().await;
        self.apply_versions(result);
    }

    /// Reload tags. A failed fetch is logged and the previous list kept.
    pub async fn fetch_tags(&mut self) {
        self.loading.tags = true;
        let result = self.source.list_tags().await;
        self.apply_tags(result);
    }

    /// Reload versions and tags concurrently.
    pub async fn fetch_all(&mut self) {
        self.loading = LoadingState {
            versions: true,
            tags: true,
        };
        let (versions, tags) =
            futures::join!(self.source.list_versions(), self.source.list_tags());
        self.apply_versions(versions);
        self.apply_tags(tags);
    }

    fn apply_versions(&mut self, result: Result<Vec<Version>>) {
        match result {
            Ok(versions) => {
                debug!(count = versions.len(), "Loaded versions");
                self.versions = versions;
            }
            Err(e) => error!(error = %e, "Failed to fetch versions"),
        }
        self.loading.versions = false;
    }

    fn apply_tags(&mut self, result: Result<Vec<Tag>>) {
        match result {
            Ok(tags) => {
                debug!(count = tags.len(), "Loaded tags");
                self.tags = tags;
            }
            Err(e) => error!(error = %e, "Failed to fetch tags"),
        }
        self.loading.tags = false;
    }

    pub async fn create_version(&mut self, version: &str) -> Result<Version> {
        match self.source.create_version(version).await {
            Ok(created) => {
                self.versions.push(created.clone());
                Ok(created)
            }
            Err(e) => {
                error!(version = version, error = %e, "Failed to create version");
                Err(e)
            }
        }
    }

    pub async fn create_tag(&mut self, tag: &str) -> Result<Tag> {
        match self.source.create_tag(tag).await {
            Ok(created) => {
                self.tags.push(created.clone());
                Ok(created)
            }
            Err(e) => {
                error!(tag = tag, error = %e, "Failed to create tag");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::api::ApiError;

    #[derive(Default)]
    struct FakeSource {
        versions: Mutex<Option<Vec<Version>>>,
        tags: Mutex<Option<Vec<Tag>>>,
        reject_creates: bool,
    }

    fn version(name: &str) -> Version {
        Version {
            id: None,
            version: name.to_string(),
        }
    }

    fn tag(name: &str) -> Tag {
        Tag {
            id: None,
            tag: name.to_string(),
        }
    }

    impl DatasetSource for FakeSource {
        async fn list_versions(&self) -> Result<Vec<Version>> {
            self.versions
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ApiError::ServerError("versions down".to_string()).into())
        }

        async fn list_tags(&self) -> Result<Vec<Tag>> {
            self.tags
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ApiError::ServerError("tags down".to_string()).into())
        }

        async fn create_version(&self, name: &str) -> Result<Version> {
            if self.reject_creates {
                return Err(ApiError::Rejected("Version already exists".to_string()).into());
            }
            Ok(Version {
                id: Some(1),
                version: name.to_string(),
            })
        }

        async fn create_tag(&self, name: &str) -> Result<Tag> {
            if self.reject_creates {
                return Err(ApiError::Rejected("Tag already exists".to_string()).into());
            }
            Ok(Tag {
                id: Some(1),
                tag: name.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_all_populates_options() {
        let source = FakeSource {
            versions: Mutex::new(Some(vec![version("v1"), version("v2")])),
            tags: Mutex::new(Some(vec![tag("rust")])),
            ..Default::default()
        };
        let mut store = CommonStore::new(source);

        store.fetch_all().await;

        assert_eq!(store.loading(), LoadingState::default());
        assert_eq!(
            store.version_options(),
            vec![
                SelectOption { label: "v1".to_string(), value: "v1".to_string() },
                SelectOption { label: "v2".to_string(), value: "v2".to_string() },
            ]
        );
        assert_eq!(store.tag_options().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_list_and_clears_loading() {
        let source = FakeSource {
            versions: Mutex::new(Some(vec![version("v1")])),
            ..Default::default()
        };
        let mut store = CommonStore::new(source);
        store.fetch_versions().await;
        assert_eq!(store.versions().len(), 1);

        *store.source.versions.lock().unwrap() = None;
        store.fetch_versions().await;
        store.fetch_tags().await;

        assert_eq!(store.versions(), &[version("v1")]);
        assert!(store.tags().is_empty());
        assert!(!store.loading().versions);
        assert!(!store.loading().tags);
    }

    #[tokio::test]
    async fn test_create_appends_created_record() {
        let mut store = CommonStore::new(FakeSource::default());

        let created = store.create_version("2024-Q2").await.unwrap();
        assert_eq!(created.id, Some(1));
        assert_eq!(store.versions(), &[created]);

        store.create_tag("python").await.unwrap();
        assert_eq!(store.tag_options()[0].value, "python");
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let mut store = CommonStore::new(FakeSource {
            reject_creates: true,
            ..Default::default()
        });

        let err = store.create_tag("dup").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Rejected(_))));
        assert!(store.tags().is_empty());

        assert!(store.create_version("dup").await.is_err());
        assert!(store.versions().is_empty());
    }
}
