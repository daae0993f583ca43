//! In-memory stand-ins for the external collaborators, for tests.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use crate::traits::{
    CatalogCache,
    DownstreamError,
    Notification,
    Notifier,
    ProviderDocument,
    ProviderShipment,
    ShipmentProvider,
    ShipmentRequest,
};

pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer\n%%EOF";

#[derive(Debug, Default)]
struct ProviderState {
    requests: Vec<ShipmentRequest>,
    fail_on_create: bool,
    document: Option<ProviderDocument>,
    delay: Option<std::time::Duration>,
}

/// A shipment provider that records every request and hands out sequential AWB numbers.
#[derive(Debug, Clone, Default)]
pub struct FakeShipmentProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl FakeShipmentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_on_create = fail;
    }

    /// The document returned for labels and manifests. Defaults to a small valid PDF.
    pub fn set_document(&self, content: &[u8], url: Option<&str>) {
        self.state.lock().unwrap().document =
            Some(ProviderDocument { content: content.to_vec(), url: url.map(String::from) });
    }

    /// Makes every call sleep before answering, to exercise timeouts.
    pub fn set_delay(&self, delay: std::time::Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn requests(&self) -> Vec<ShipmentRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn awb_for(n: usize) -> String {
        format!("AWB{n:08}")
    }

    fn delay(&self) -> Option<std::time::Duration> {
        self.state.lock().unwrap().delay
    }
}

impl ShipmentProvider for FakeShipmentProvider {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<ProviderShipment, DownstreamError> {
        if let Some(d) = self.delay() {
            tokio::time::sleep(d).await;
        }
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);
        if state.fail_on_create {
            return Err(DownstreamError::Unavailable("Shipping unavailable".into()));
        }
        let n = state.requests.len();
        Ok(ProviderShipment { provider_shipment_id: format!("SHIP-{n:04}"), awb_number: Some(Self::awb_for(n)) })
    }

    async fn generate_label(&self, _provider_shipment_id: &str) -> Result<ProviderDocument, DownstreamError> {
        let doc = self.state.lock().unwrap().document.clone();
        Ok(doc.unwrap_or_else(|| ProviderDocument { content: SAMPLE_PDF.to_vec(), url: None }))
    }

    async fn generate_manifest(&self, provider_shipment_id: &str) -> Result<ProviderDocument, DownstreamError> {
        self.generate_label(provider_shipment_id).await
    }
}

/// A notifier that keeps every notification it was asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DownstreamError> {
        if *self.fail.lock().unwrap() {
            return Err(DownstreamError::Unavailable("mail relay down".into()));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// A cache that counts invalidations.
#[derive(Debug, Clone, Default)]
pub struct RecordingCache {
    invalidations: Arc<AtomicUsize>,
    keys: Arc<Mutex<Vec<String>>>,
    delay: Arc<Mutex<Option<std::time::Duration>>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every invalidation sleep before it is recorded, to exercise timeouts.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl CatalogCache for RecordingCache {
    async fn invalidate(&self, keys: Vec<String>) -> Result<(), DownstreamError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().extend(keys);
        Ok(())
    }
}
