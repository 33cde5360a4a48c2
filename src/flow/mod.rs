//! The intake flow: step catalog, field validation, answer storage and the
//! wizard state machine.

mod catalog;
mod controller;
mod error;
mod prompt;
mod store;
mod types;
mod validator;


pub use catalog::{
    Branch, BranchCondition, StepCatalog, StepDescriptor, ANALYZE_SPECIFIC_LOCATION, CITIES,
    GENERAL_ANALYSIS, GOALS, INDUSTRIES, LOCATION_ANALYSIS_KEY,
};
pub use controller::{
    AnswerOutcome, FlowController, FlowPhase, FlowSnapshot, StepView, SubmissionStart, Transition,
};
pub use error::{CatalogError, FlowError, ValidationError, ValidationErrorKind};
pub use prompt::PromptRenderer;
pub use store::AnswerStore;
pub use types::{parse_amount, Answer, Constraints, CustomCheck, InputKind, StepId};
pub use validator::{format_amount, validate};
