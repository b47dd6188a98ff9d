//! Appender trait for log output destinations and the shared appender proxy

use super::{
    destination::{Destination, WriterSpec},
    error::Result,
    log_record::LogRecord,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Physical sink receiving log records
pub trait Appender: Send {
    fn append(&mut self, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;

    /// Release underlying resources; the appender is not used afterwards
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Instantiates physical appenders for writers
pub trait AppenderFactory: Send + Sync {
    fn create(&self, spec: &WriterSpec, template: &str) -> Result<Box<dyn Appender>>;
}

/// Identity of a shared managed appender
///
/// Two rules pointing at the same destination with the same rendering
/// template share one appender.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppenderKey {
    pub destination: Destination,
    pub template: String,
}

impl fmt::Display for AppenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.destination, self.template)
    }
}

/// Who owns the lifecycle of an attached appender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppenderOrigin {
    /// Created and shared by the reconciler
    Managed(AppenderKey),
    /// Registered by the host under a name
    Dynamic(String),
}

pub type AppenderHandle = Arc<AppenderProxy>;

static NEXT_APPENDER_ID: AtomicU64 = AtomicU64::new(1);

struct ProxyState {
    delegate: Box<dyn Appender>,
    spec: Option<WriterSpec>,
}

/// Attachable handle around a physical appender.
///
/// The proxy keeps its identity while the delegate underneath may be
/// replaced when the writer's rotation parameters change. Once closed,
/// records are discarded.
pub struct AppenderProxy {
    id: u64,
    origin: AppenderOrigin,
    state: Mutex<ProxyState>,
    closed: AtomicBool,
}

impl AppenderProxy {
    pub(crate) fn managed(key: AppenderKey, spec: WriterSpec, delegate: Box<dyn Appender>) -> Self {
        Self::with_origin(AppenderOrigin::Managed(key), Some(spec), delegate)
    }

    pub(crate) fn dynamic(name: impl Into<String>, delegate: Box<dyn Appender>) -> Self {
        Self::with_origin(AppenderOrigin::Dynamic(name.into()), None, delegate)
    }

    fn with_origin(
        origin: AppenderOrigin,
        spec: Option<WriterSpec>,
        delegate: Box<dyn Appender>,
    ) -> Self {
        Self {
            id: NEXT_APPENDER_ID.fetch_add(1, Ordering::Relaxed),
            origin,
            state: Mutex::new(ProxyState { delegate, spec }),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> &AppenderOrigin {
        &self.origin
    }

    pub fn key(&self) -> Option<&AppenderKey> {
        match &self.origin {
            AppenderOrigin::Managed(key) => Some(key),
            AppenderOrigin::Dynamic(_) => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self.origin, AppenderOrigin::Managed(_))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Name of the physical appender currently behind this proxy
    pub fn delegate_name(&self) -> String {
        self.state.lock().delegate.name().to_string()
    }

    pub fn append(&self, record: &LogRecord) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state.lock().delegate.append(record)
    }

    pub fn flush(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state.lock().delegate.flush()
    }

    pub(crate) fn spec(&self) -> Option<WriterSpec> {
        self.state.lock().spec.clone()
    }

    /// Swap in a new delegate, closing the previous one
    pub(crate) fn replace_delegate(&self, spec: WriterSpec, delegate: Box<dyn Appender>) -> Result<()> {
        let mut state = self.state.lock();
        let mut previous = std::mem::replace(&mut state.delegate, delegate);
        state.spec = Some(spec);
        previous.close()
    }

    /// Close the delegate; only the first call has an effect
    pub(crate) fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.state.lock().delegate.close()
    }
}

impl fmt::Debug for AppenderProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppenderProxy")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    struct CountingAppender {
        appended: Arc<AtomicU64>,
        closed: Arc<AtomicBool>,
    }

    impl Appender for CountingAppender {
        fn append(&mut self, _record: &LogRecord) -> Result<()> {
            self.appended.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn counting() -> (Box<dyn Appender>, Arc<AtomicU64>, Arc<AtomicBool>) {
        let appended = Arc::new(AtomicU64::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let appender = CountingAppender {
            appended: Arc::clone(&appended),
            closed: Arc::clone(&closed),
        };
        (Box::new(appender), appended, closed)
    }

    #[test]
    fn test_closed_proxy_discards_records() {
        let (delegate, appended, closed) = counting();
        let proxy = AppenderProxy::dynamic("audit", delegate);
        let record = LogRecord::new("a", LogLevel::Info, "hello");

        proxy.append(&record).unwrap();
        proxy.close().unwrap();
        proxy.append(&record).unwrap();

        assert_eq!(appended.load(Ordering::Relaxed), 1);
        assert!(closed.load(Ordering::Relaxed));
        assert!(proxy.is_closed());
    }

    #[test]
    fn test_replace_delegate_keeps_identity() {
        let key = AppenderKey {
            destination: Destination::Console,
            template: "%msg%n".to_string(),
        };
        let spec = WriterSpec {
            destination: Destination::Console,
            max_files: 5,
            rotation: crate::core::RotationThreshold::parse("1mb"),
        };
        let (first, _, first_closed) = counting();
        let proxy = AppenderProxy::managed(key, spec.clone(), first);
        let id = proxy.id();

        let (second, second_appended, _) = counting();
        let updated = WriterSpec { max_files: 9, ..spec };
        proxy.replace_delegate(updated.clone(), second).unwrap();

        proxy.append(&LogRecord::new("a", LogLevel::Info, "x")).unwrap();
        assert_eq!(proxy.id(), id);
        assert!(first_closed.load(Ordering::Relaxed));
        assert_eq!(second_appended.load(Ordering::Relaxed), 1);
        assert_eq!(proxy.spec(), Some(updated));
    }
}
