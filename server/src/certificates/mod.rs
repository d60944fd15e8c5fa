pub mod batch;
pub mod fonts;
pub mod layout;
pub mod render;

pub use batch::{BatchSummary, CertificateJob, DeliveryFailure};
pub use layout::{map_to_template, CertificateLayout, Placement, TemplateSize};
