#![forbid(unsafe_code)]

pub mod answers;
pub mod clock;
pub mod engine;
pub mod error;
pub mod pages;
pub mod persist;
pub mod shell;
pub mod sink;
pub mod spec;
pub mod store;
mod sync;
pub mod validate;
pub mod variants;

pub use answers::{CompletionPayload, FlowPhase, FlowState, Navigation, PageValidation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    ChangeHook, CompleteHook, FlowControls, Paginator, PaginatorBuilder, PaginatorOptions,
    ProgressFormatter, ResetHook,
};
pub use error::{FlowError, Result, SinkError, SlotError};
pub use pages::{PageContext, PageFactory, PageRegistry, PageUnit};
pub use persist::{FileSlot, MemorySlot, Persistence, RestoredProgress, Snapshot, StateSlot};
pub use shell::{
    Direction, DirectionalShell, HeadlessShell, InputNode, MountPoint, NavigationState, Node,
    Progress, Shell,
};
pub use sink::{JsonFileSink, ResponseSink};
pub use spec::{
    Choice, Constraint, DocumentOptions, OutputKey, PageDescriptor, ParameterMeta, QuestionSpec,
    SurveyDocument, key_for,
};
pub use validate::{QuestionError, QuestionInstance, QuestionsReport, validate_questions};
pub use variants::{Field, FieldHandle, FieldInit, FieldVerdict, Variant, VariantRegistry};
