pub mod diagnostic;
pub mod media;
pub mod result;
pub mod source;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use media::{ContentType, MediaRequest};
pub use result::{ProviderDescriptor, ProviderResult, SourceResponse};
pub use source::{AudioTrack, ProviderRef, Quality, Source, StreamType, Subtitle};
