//! Asset resolution chain.
//!
//! UI bundles: explicit location, else default bucket when no tag is set,
//! else a tag-scoped bucket for build tags, else the release bucket
//! qualified by the tag. Locale packs use only the first two buckets.

use crate::config::AssetSourceOverrides;

/// Environment-class tags that have a bucket of their own
pub const BUILD_TAGS: &[&str] = &["dev", "staging", "rc", "master"];

pub const UI_ARCHIVE: &str = "build.zip";
pub const LOCALE_ARCHIVE: &str = "locales.zip";

const DEFAULT_BUCKET: &str = "https://plugins-dev.s3.amazonaws.com";
const TAG_BUCKET: &str = "https://plugins-{tag}.s3.amazonaws.com";
const RELEASE_BUCKET: &str = "https://plugins-release.s3.amazonaws.com";
const CDN_HOST: &str = "https://plugin-uis.stackgen.io";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSources {
    default_bucket: String,
    tag_bucket: String,
    release_bucket: String,
    cdn_host: String,
}

impl Default for AssetSources {
    fn default() -> Self {
        Self {
            default_bucket: DEFAULT_BUCKET.to_string(),
            tag_bucket: TAG_BUCKET.to_string(),
            release_bucket: RELEASE_BUCKET.to_string(),
            cdn_host: CDN_HOST.to_string(),
        }
    }
}

impl AssetSources {
    pub fn from_overrides(overrides: Option<&AssetSourceOverrides>) -> Self {
        let base = Self::default();
        let Some(overrides) = overrides else {
            return base;
        };
        let pick = |value: &Option<String>, fallback: String| {
            value
                .as_deref()
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(fallback)
        };
        Self {
            default_bucket: pick(&overrides.default_bucket, base.default_bucket),
            tag_bucket: pick(&overrides.tag_bucket, base.tag_bucket),
            release_bucket: pick(&overrides.release_bucket, base.release_bucket),
            cdn_host: pick(&overrides.cdn_host, base.cdn_host),
        }
    }

    /// Host that plugin UI descriptors point at before rewriting
    pub fn cdn_host(&self) -> &str {
        &self.cdn_host
    }

    pub fn is_build_tag(tag: &str) -> bool {
        BUILD_TAGS.contains(&tag)
    }

    fn tag_bucket(&self, tag: &str) -> String {
        self.tag_bucket.replace("{tag}", tag)
    }

    /// Bucket root for tagged lookups following the full chain
    fn chain_root(&self, tag: Option<&str>) -> String {
        match tag {
            None => self.default_bucket.clone(),
            Some(tag) if Self::is_build_tag(tag) => self.tag_bucket(tag),
            Some(tag) => format!("{}/{}", self.release_bucket, tag),
        }
    }

    pub fn ui_bundle_url(&self, plugin: &str, explicit: Option<&str>, tag: Option<&str>) -> String {
        if let Some(location) = explicit {
            return location.to_string();
        }
        format!(
            "{}/uis/plugin-{}-ui/{}",
            self.chain_root(tag),
            plugin,
            UI_ARCHIVE
        )
    }

    pub fn locale_pack_url(&self, tag: Option<&str>) -> String {
        let root = match tag {
            None => self.default_bucket.clone(),
            Some(tag) => self.tag_bucket(tag),
        };
        format!("{root}/{LOCALE_ARCHIVE}")
    }

    pub fn catalog_url(&self, tag: Option<&str>) -> String {
        format!("{}/{}", self.chain_root(tag), crate::catalog::CATALOG_FILE)
    }
}
