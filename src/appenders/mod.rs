//! Bundled physical appenders

pub mod console;
pub mod file;

pub use console::ConsoleAppender;
pub use file::FileAppender;

use crate::core::{Appender, AppenderFactory, Destination, Result, WriterSpec};

/// Factory used when the host does not supply its own: standard output
/// for console writers, rotating files otherwise.
///
/// The bundled sinks write a fixed line layout; the template is not
/// rendered.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardAppenderFactory;

impl AppenderFactory for StandardAppenderFactory {
    fn create(&self, spec: &WriterSpec, _template: &str) -> Result<Box<dyn Appender>> {
        match &spec.destination {
            Destination::Console => Ok(Box::new(ConsoleAppender::new())),
            Destination::File(_) => Ok(Box::new(FileAppender::from_spec(spec)?)),
        }
    }
}
