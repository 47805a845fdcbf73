//! Request classification.

use offline_core::{
    NavigationRule, RequestClass, RequestRecord, StaticAssetManifest, StaticMatching, WorkerConfig,
};

/// Assigns each request exactly one [`RequestClass`].
///
/// Classification is pure and synchronous. The rules are checked in order:
/// non-GET requests bypass, then navigation, then manifest match, and any
/// remaining GET is generic.
#[derive(Debug, Clone)]
pub struct Classifier {
    navigation: NavigationRule,
    static_matching: StaticMatching,
    manifest: StaticAssetManifest,
}

impl Classifier {
    /// Build a classifier from deployment configuration.
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            navigation: config.navigation,
            static_matching: config.static_matching,
            manifest: config.manifest.clone(),
        }
    }

    /// Classify a request.
    pub fn classify(&self, request: &RequestRecord) -> RequestClass {
        if *request.method() != http::Method::GET {
            return RequestClass::Bypass;
        }

        if self.is_navigation(request) {
            return RequestClass::Navigation;
        }

        if self.static_matching == StaticMatching::Manifest && self.manifest.matches(request.url())
        {
            return RequestClass::StaticAsset;
        }

        RequestClass::GenericGet
    }

    fn is_navigation(&self, request: &RequestRecord) -> bool {
        if request.is_navigation() {
            return true;
        }

        match self.navigation {
            NavigationRule::ModeOnly => false,
            NavigationRule::ModeOrAccept => request.accept().is_some_and(accepts_html),
        }
    }
}

fn accepts_html(accept: &str) -> bool {
    accept.to_ascii_lowercase().contains("text/html")
}
