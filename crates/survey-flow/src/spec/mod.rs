pub mod document;
pub mod page;
pub mod question;

pub use document::{DocumentOptions, SurveyDocument};
pub use page::{PageDescriptor, ParameterMeta, key_for, signature_for};
pub use question::{Choice, Constraint, OutputKey, QuestionSpec};
