//! Step catalog: the ordered, immutable list of intake steps.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::CatalogError;
use super::types::{Answer, Constraints, CustomCheck, InputKind, StepId};

/// Field that receives the location-analysis payload from the map sub-flow
pub const LOCATION_ANALYSIS_KEY: &str = "location_analysis";

/// Option of the gating step that opens the location-analysis sub-flow
pub const ANALYZE_SPECIFIC_LOCATION: &str = "Yes, analyze a specific location";

/// Option of the gating step that keeps the general analysis
pub const GENERAL_ANALYSIS: &str = "No, general analysis";

/// Description of a single intake step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Unique step identifier
    pub id: StepId,
    /// Domain field name used when the answers are flattened for submission
    pub field: String,
    /// Short heading
    pub title: String,
    /// Question shown to the user; may reference earlier answers as `{{field}}`
    pub prompt: String,
    /// How the answer is collected
    pub input_kind: InputKind,
    /// Choice labels (choice kinds only)
    #[serde(default)]
    pub options: Vec<String>,
    /// Whether an empty answer blocks progression
    #[serde(default)]
    pub required: bool,
    /// Length, count and numeric bounds
    #[serde(default)]
    pub constraints: Constraints,
    /// Optional guidance
    #[serde(default)]
    pub help_text: Option<String>,
    /// Conditional sub-steps opened by this step's answer
    #[serde(default)]
    pub branch: Option<Branch>,
    /// Custom predicate overriding the kind-based checks
    #[serde(skip)]
    pub custom: Option<CustomCheck>,
}

impl StepDescriptor {
    fn base(id: u32, field: &str, title: &str, prompt: &str, input_kind: InputKind) -> Self {
        Self {
            id: StepId(id),
            field: field.to_string(),
            title: title.to_string(),
            prompt: prompt.to_string(),
            input_kind,
            options: Vec::new(),
            required: false,
            constraints: Constraints::default(),
            help_text: None,
            branch: None,
            custom: None,
        }
    }

    pub fn free_text(id: u32, field: &str, title: &str, prompt: &str) -> Self {
        Self::base(id, field, title, prompt, InputKind::FreeText)
    }

    pub fn voice_or_text(id: u32, field: &str, title: &str, prompt: &str) -> Self {
        Self::base(id, field, title, prompt, InputKind::VoiceOrText)
    }

    pub fn single_choice<S: AsRef<str>>(
        id: u32,
        field: &str,
        title: &str,
        prompt: &str,
        options: &[S],
    ) -> Self {
        let mut step = Self::base(id, field, title, prompt, InputKind::SingleChoice);
        step.options = options.iter().map(|o| o.as_ref().to_string()).collect();
        step
    }

    pub fn multi_choice<S: AsRef<str>>(
        id: u32,
        field: &str,
        title: &str,
        prompt: &str,
        options: &[S],
        max_selections: usize,
    ) -> Self {
        let mut step = Self::base(id, field, title, prompt, InputKind::MultiChoice);
        step.options = options.iter().map(|o| o.as_ref().to_string()).collect();
        step.constraints.max_selections = Some(max_selections);
        step
    }

    pub fn numeric(id: u32, field: &str, title: &str, prompt: &str, min: f64, max: f64) -> Self {
        let mut step = Self::base(id, field, title, prompt, InputKind::NumericRange);
        step.constraints.min_value = Some(min);
        step.constraints.max_value = Some(max);
        step
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Trimmed length bounds in characters; `min == 0` means no minimum
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.constraints.min_length = (min > 0).then_some(min);
        self.constraints.max_length = Some(max);
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help_text = Some(text.to_string());
        self
    }

    pub fn with_custom(mut self, check: CustomCheck) -> Self {
        self.custom = Some(check);
        self
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }
}

/// Condition over the gating step's answer that opens a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BranchCondition {
    /// Single-choice answer equals `value`
    Equals { value: String },
    /// Single-choice answer is one of `values`, or a multi-choice answer contains one
    AnyOf { values: Vec<String> },
    /// Any non-empty answer
    Answered,
}

impl BranchCondition {
    pub fn matches(&self, answer: Option<&Answer>) -> bool {
        let Some(answer) = answer.filter(|a| !a.is_empty()) else {
            return false;
        };

        match (self, answer) {
            (BranchCondition::Answered, _) => true,
            (BranchCondition::Equals { value }, Answer::Choice(choice)) => choice.trim() == value,
            (BranchCondition::Equals { value }, Answer::Choices(set)) => set.contains(value),
            (BranchCondition::AnyOf { values }, Answer::Choice(choice)) => {
                values.iter().any(|v| v == choice.trim())
            }
            (BranchCondition::AnyOf { values }, Answer::Choices(set)) => {
                values.iter().any(|v| set.contains(v))
            }
            _ => false,
        }
    }

    fn referenced_values(&self) -> Vec<&str> {
        match self {
            BranchCondition::Equals { value } => vec![value.as_str()],
            BranchCondition::AnyOf { values } => values.iter().map(String::as_str).collect(),
            BranchCondition::Answered => Vec::new(),
        }
    }
}

/// Sub-sequence inserted after its gating step while `when` holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub when: BranchCondition,
    pub steps: Vec<StepDescriptor>,
    /// Sideband keys written by this branch; cleared when it closes
    #[serde(default)]
    pub aux_keys: Vec<String>,
}

impl Branch {
    pub fn new(when: BranchCondition, steps: Vec<StepDescriptor>) -> Self {
        Self {
            when,
            steps,
            aux_keys: Vec::new(),
        }
    }

    pub fn owning_aux(mut self, key: &str) -> Self {
        self.aux_keys.push(key.to_string());
        self
    }
}

/// On-disk catalog layout
#[derive(Debug, Deserialize)]
struct CatalogFile {
    steps: Vec<StepDescriptor>,
}

/// Validated, immutable step sequence
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepDescriptor>,
}

impl StepCatalog {
    /// Validate and wrap a step sequence
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, CatalogError> {
        if steps.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ids = HashSet::new();
        let mut fields = HashSet::new();

        for step in &steps {
            check_step(step, &mut ids, &mut fields)?;

            if let Some(ref branch) = step.branch {
                if branch.steps.is_empty() {
                    return Err(CatalogError::EmptyBranch(step.field.clone()));
                }
                if step.input_kind.has_options() {
                    for value in branch.when.referenced_values() {
                        if !step.options.iter().any(|o| o == value) {
                            return Err(CatalogError::UnknownBranchValue {
                                field: step.field.clone(),
                                value: value.to_string(),
                            });
                        }
                    }
                }
                for sub in &branch.steps {
                    if sub.branch.is_some() {
                        return Err(CatalogError::NestedBranch(sub.field.clone()));
                    }
                    check_step(sub, &mut ids, &mut fields)?;
                }
            }
        }

        debug!(steps = steps.len(), "Step catalog validated");
        Ok(Self { steps })
    }

    /// Load a catalog from a `.toml`, `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(format!("{}: {}", path.display(), e)))?;

        let file: CatalogFile = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str(&contents).map_err(|e| CatalogError::Parse(e.to_string()))?
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&contents).map_err(|e| CatalogError::Parse(e.to_string()))?
            }
            _ => toml::from_str(&contents).map_err(|e| CatalogError::Parse(e.to_string()))?,
        };

        debug!(path = %path.display(), "Loaded step catalog file");
        Self::new(file.steps)
    }

    /// The SmartStart project intake
    pub fn smartstart() -> Result<Self, CatalogError> {
        Self::new(smartstart_steps())
    }

    /// Top-level steps (branch sub-steps excluded)
    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by field name, including branch sub-steps
    pub fn find_field(&self, field: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find_map(|step| {
            if step.field == field {
                return Some(step);
            }
            step.branch
                .as_ref()
                .and_then(|b| b.steps.iter().find(|s| s.field == field))
        })
    }
}

fn check_step(
    step: &StepDescriptor,
    ids: &mut HashSet<StepId>,
    fields: &mut HashSet<String>,
) -> Result<(), CatalogError> {
    if step.field.trim().is_empty() {
        return Err(CatalogError::MissingField(step.id));
    }
    if !ids.insert(step.id) {
        return Err(CatalogError::DuplicateId(step.id));
    }
    if !fields.insert(step.field.clone()) {
        return Err(CatalogError::DuplicateField(step.field.clone()));
    }

    if step.input_kind.has_options() {
        if step.options.is_empty() {
            return Err(CatalogError::MissingOptions {
                field: step.field.clone(),
                kind: step.input_kind,
            });
        }
        let mut seen = HashSet::new();
        for option in &step.options {
            if !seen.insert(option.as_str()) {
                return Err(CatalogError::DuplicateOption {
                    field: step.field.clone(),
                    option: option.clone(),
                });
            }
        }
    }

    let c = &step.constraints;
    if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
        if min > max {
            return Err(CatalogError::InvertedBounds {
                field: step.field.clone(),
                detail: format!("min_length {} > max_length {}", min, max),
            });
        }
    }
    if let (Some(min), Some(max)) = (c.min_value, c.max_value) {
        if min > max {
            return Err(CatalogError::InvertedBounds {
                field: step.field.clone(),
                detail: format!("min_value {} > max_value {}", min, max),
            });
        }
    }
    if c.max_selections == Some(0) {
        return Err(CatalogError::ZeroSelections(step.field.clone()));
    }

    Ok(())
}

pub const INDUSTRIES: &[&str] = &[
    "Technology",
    "Retail & E-commerce",
    "Food & Beverage",
    "Healthcare",
    "Education",
    "Tourism & Hospitality",
    "Real Estate",
    "Manufacturing",
    "Other",
];

pub const CITIES: &[&str] = &[
    "Riyadh", "Jeddah", "Dammam", "Mecca", "Medina", "Khobar", "Abha", "Tabuk", "Other",
];

pub const GOALS: &[&str] = &[
    "Achieve profitability",
    "Expand to new markets",
    "Build a strong brand",
    "Attract investors",
    "Create jobs",
    "Serve the local community",
    "Innovate in the sector",
    "Build a loyal customer base",
];

/// Length bounds come from the step's constraints, with domain wording
fn differentiation_check() -> CustomCheck {
    CustomCheck::new("differentiation", |answer: &Answer, constraints: &Constraints| {
        let len = answer.display().chars().count();
        let min = constraints.min_length.unwrap_or(0);
        if len < min {
            return Some(format!(
                "Tell us what sets your project apart from competitors (at least {} characters, {} so far)",
                min, len
            ));
        }
        match constraints.max_length {
            Some(max) if len > max => Some(format!(
                "Keep your competitive advantage under {} characters",
                max
            )),
            _ => None,
        }
    })
}

fn smartstart_steps() -> Vec<StepDescriptor> {
    vec![
        StepDescriptor::voice_or_text(
            1,
            "idea",
            "Your idea",
            "Describe your business idea. You can type it or dictate it.",
        )
        .required()
        .length(10, 1000)
        .help("What problem does it solve, and for whom?"),
        StepDescriptor::free_text(
            2,
            "project_name",
            "Project name",
            "What is the name of your project?",
        )
        .required()
        .length(2, 80),
        StepDescriptor::single_choice(
            3,
            "industry",
            "Industry",
            "Which industry does {{project_name}} belong to?",
            INDUSTRIES,
        )
        .required(),
        StepDescriptor::single_choice(
            4,
            "location",
            "Location",
            "Where will {{project_name}} operate?",
            CITIES,
        )
        .required(),
        StepDescriptor::free_text(
            5,
            "target_market",
            "Target market",
            "Who is the target audience for {{project_name}}?",
        )
        .required()
        .length(10, 500)
        .help("Age group, income level, habits, location."),
        StepDescriptor::numeric(
            6,
            "investment_amount",
            "Capital",
            "How much capital do you plan to invest (SAR)?",
            10_000.0,
            10_000_000.0,
        )
        .required()
        .help("Between 10,000 and 10,000,000 SAR."),
        StepDescriptor::multi_choice(
            7,
            "goals",
            "Goals",
            "What are your main goals? Choose up to five.",
            GOALS,
            5,
        )
        .required(),
        StepDescriptor::free_text(
            8,
            "competitors",
            "Competitors",
            "Who are your main competitors in {{location}}? (optional)",
        )
        .length(0, 300),
        StepDescriptor::free_text(
            9,
            "differentiation",
            "Competitive advantage",
            "What makes {{project_name}} different from the competition?",
        )
        .required()
        .length(15, 400)
        .with_custom(differentiation_check()),
        StepDescriptor::single_choice(
            10,
            LOCATION_ANALYSIS_KEY,
            "Location analysis",
            "Would you like an analysis of a specific site for {{project_name}}?",
            &[ANALYZE_SPECIFIC_LOCATION, GENERAL_ANALYSIS],
        )
        .help("A site analysis looks at nearby competitors and foot traffic.")
        .with_branch(
            Branch::new(
                BranchCondition::Equals {
                    value: ANALYZE_SPECIFIC_LOCATION.to_string(),
                },
                vec![StepDescriptor::free_text(
                    101,
                    "analysis_site",
                    "Site",
                    "Which neighbourhood, street or landmark in {{location}} should we analyze?",
                )
                .length(0, 200)],
            )
            .owning_aux(LOCATION_ANALYSIS_KEY),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_step(id: u32, field: &str) -> StepDescriptor {
        StepDescriptor::free_text(id, field, "Title", "Prompt")
    }

    #[test]
    fn test_smartstart_catalog_is_valid() {
        let catalog = StepCatalog::smartstart().unwrap();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.steps()[0].field, "idea");
        assert!(catalog.find_field("analysis_site").is_some());
        assert!(catalog.find_field("nope").is_none());
    }

    #[test]
    fn test_smartstart_observed_bounds() {
        let catalog = StepCatalog::smartstart().unwrap();

        let idea = catalog.find_field("idea").unwrap();
        assert_eq!(idea.constraints.min_length, Some(10));
        assert_eq!(idea.constraints.max_length, Some(1000));

        let capital = catalog.find_field("investment_amount").unwrap();
        assert_eq!(capital.constraints.min_value, Some(10_000.0));
        assert_eq!(capital.constraints.max_value, Some(10_000_000.0));

        let goals = catalog.find_field("goals").unwrap();
        assert_eq!(goals.options.len(), 8);
        assert_eq!(goals.constraints.max_selections, Some(5));

        let competitors = catalog.find_field("competitors").unwrap();
        assert!(!competitors.required);
        assert_eq!(competitors.constraints.min_length, None);
        assert_eq!(competitors.constraints.max_length, Some(300));

        let gate = catalog.find_field(LOCATION_ANALYSIS_KEY).unwrap();
        assert!(!gate.required);
        assert!(gate.branch.is_some());
    }

    #[test]
    fn test_differentiation_check_follows_step_bounds() {
        use crate::flow::validator::validate;

        let catalog = StepCatalog::smartstart().unwrap();
        let mut step = catalog.find_field("differentiation").unwrap().clone();
        let sixteen = Answer::text("Faster delivery!");

        assert!(validate(&step, Some(&sixteen)).is_none());
        let short = validate(&step, Some(&Answer::text("Cheaper"))).unwrap();
        assert!(short.message.contains("at least 15 characters, 7 so far"));

        step.constraints.min_length = Some(20);
        step.constraints.max_length = Some(30);
        let err = validate(&step, Some(&sixteen)).unwrap();
        assert!(err.message.contains("at least 20 characters"));
        let err = validate(&step, Some(&Answer::text("x".repeat(31)))).unwrap();
        assert_eq!(err.message, "Keep your competitive advantage under 30 characters");
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert_eq!(StepCatalog::new(vec![]).unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = StepCatalog::new(vec![text_step(1, "a"), text_step(1, "b")]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId(StepId(1)));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = StepCatalog::new(vec![text_step(1, "a"), text_step(2, "a")]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateField("a".into()));
    }

    #[test]
    fn test_single_choice_without_options_rejected() {
        let step = StepDescriptor::single_choice::<&str>(1, "industry", "T", "P", &[]);
        let err = StepCatalog::new(vec![step]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingOptions { .. }));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let step = StepDescriptor::numeric(1, "capital", "T", "P", 100.0, 10.0);
        let err = StepCatalog::new(vec![step]).unwrap_err();
        assert!(matches!(err, CatalogError::InvertedBounds { .. }));
    }

    #[test]
    fn test_branch_value_must_be_an_option() {
        let gate = StepDescriptor::single_choice(1, "gate", "T", "P", &["yes", "no"]).with_branch(
            Branch::new(
                BranchCondition::Equals {
                    value: "maybe".into(),
                },
                vec![text_step(2, "sub")],
            ),
        );
        let err = StepCatalog::new(vec![gate]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownBranchValue { .. }));
    }

    #[test]
    fn test_branch_sub_step_ids_must_be_unique() {
        let gate = StepDescriptor::single_choice(1, "gate", "T", "P", &["yes", "no"]).with_branch(
            Branch::new(
                BranchCondition::Equals {
                    value: "yes".into(),
                },
                vec![text_step(2, "sub")],
            ),
        );
        let err = StepCatalog::new(vec![gate, text_step(2, "later")]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId(StepId(2)));
    }

    #[test]
    fn test_branch_condition_matches() {
        let equals = BranchCondition::Equals {
            value: "yes".into(),
        };
        assert!(equals.matches(Some(&Answer::choice("yes"))));
        assert!(!equals.matches(Some(&Answer::choice("no"))));
        assert!(!equals.matches(None));

        let any = BranchCondition::AnyOf {
            values: vec!["a".into(), "b".into()],
        };
        assert!(any.matches(Some(&Answer::choices(["c", "b"]))));
        assert!(!any.matches(Some(&Answer::choices(["c"]))));

        assert!(BranchCondition::Answered.matches(Some(&Answer::text("x"))));
        assert!(!BranchCondition::Answered.matches(Some(&Answer::text("  "))));
    }

    #[test]
    fn test_load_catalog_from_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            r#"
[[steps]]
id = 1
field = "idea"
title = "Idea"
prompt = "Describe it"
input_kind = "free_text"
required = true
constraints = { min_length = 10, max_length = 1000 }

[[steps]]
id = 2
field = "capital"
title = "Capital"
prompt = "How much?"
input_kind = "numeric_range"
required = true
constraints = { min_value = 10000.0, max_value = 10000000.0 }
"#,
        )
        .unwrap();

        let catalog = StepCatalog::from_path(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.steps()[0].required);
        assert_eq!(catalog.steps()[1].input_kind, InputKind::NumericRange);
    }

    #[test]
    fn test_load_catalog_from_json_with_branch() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"steps": [{
                "id": 1, "field": "gate", "title": "Gate", "prompt": "?",
                "input_kind": "single_choice", "options": ["yes", "no"],
                "branch": {
                    "when": {"op": "equals", "value": "yes"},
                    "steps": [{"id": 2, "field": "detail", "title": "D", "prompt": "?", "input_kind": "free_text"}],
                    "aux_keys": ["detail_payload"]
                }
            }]}"#,
        )
        .unwrap();

        let catalog = StepCatalog::from_path(&path).unwrap();
        let branch = catalog.steps()[0].branch.as_ref().unwrap();
        assert_eq!(branch.steps.len(), 1);
        assert_eq!(branch.aux_keys, vec!["detail_payload".to_string()]);
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let err = StepCatalog::from_path(Path::new("/nonexistent/catalog.toml")).unwrap_err();
        assert!(matches!(err, CatalogError::Io(_)));
    }
}
