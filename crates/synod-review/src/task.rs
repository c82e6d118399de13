use std::fmt;

use synod_core::Category;

/// Role of one analyzer task in the parallel phase.
///
/// Each role is a prompt configuration dispatched through the same
/// fan-out runner: one parametrized task spec, not four bespoke agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerRole {
    /// Correctness, logic, and maintainability review.
    Quality,
    /// Vulnerability and unsafe-practice review.
    Security,
    /// Efficiency and scalability review.
    Performance,
    /// Readability and convention review.
    Style,
}

impl AnalyzerRole {
    /// All analyzer roles, in dispatch order.
    pub const ALL: [AnalyzerRole; 4] = [
        AnalyzerRole::Quality,
        AnalyzerRole::Security,
        AnalyzerRole::Performance,
        AnalyzerRole::Style,
    ];

    /// The finding category this role is constrained to emit.
    pub fn category(self) -> Category {
        match self {
            AnalyzerRole::Quality => Category::Quality,
            AnalyzerRole::Security => Category::Security,
            AnalyzerRole::Performance => Category::Performance,
            AnalyzerRole::Style => Category::Style,
        }
    }
}

impl fmt::Display for AnalyzerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerRole::Quality => write!(f, "quality"),
            AnalyzerRole::Security => write!(f, "security"),
            AnalyzerRole::Performance => write!(f, "performance"),
            AnalyzerRole::Style => write!(f, "style"),
        }
    }
}

/// Prompt configuration for one analyzer role.
///
/// # Examples
///
/// ```
/// use synod_review::task::{AnalyzerRole, TaskSpec};
///
/// let spec = TaskSpec::for_role(AnalyzerRole::Security);
/// let prompt = spec.system_prompt();
/// assert!(prompt.contains("Application Security Engineer"));
/// assert!(prompt.contains("\"category\": \"security\""));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// The analyzer role this spec configures.
    pub role: AnalyzerRole,
    persona: &'static str,
    goal: &'static str,
    focus: &'static [&'static str],
}

impl TaskSpec {
    /// Build the spec for a given role.
    pub fn for_role(role: AnalyzerRole) -> Self {
        match role {
            AnalyzerRole::Quality => Self {
                role,
                persona: "Senior Software Engineer with deep experience across languages and paradigms",
                goal: "identify logical flaws, correctness problems, and maintainability issues",
                focus: &[
                    "logic errors and incorrect edge-case handling",
                    "error handling gaps and silent failure modes",
                    "dead code, unclear control flow, and needless complexity",
                ],
            },
            AnalyzerRole::Security => Self {
                role,
                persona: "Application Security Engineer and OWASP expert",
                goal: "identify vulnerabilities, attack vectors, and unsafe coding practices",
                focus: &[
                    "injection (SQL, command, template), XSS, and CSRF",
                    "authentication and authorization flaws",
                    "hardcoded secrets, weak cryptography, unsafe deserialization",
                ],
            },
            AnalyzerRole::Performance => Self {
                role,
                persona: "Performance Engineering Specialist",
                goal: "identify inefficiencies and scalability concerns",
                focus: &[
                    "algorithmic complexity and needless repeated work",
                    "N+1 queries and chatty I/O patterns",
                    "unbounded memory growth and missing caching opportunities",
                ],
            },
            AnalyzerRole::Style => Self {
                role,
                persona: "Staff Engineer and code quality advocate",
                goal: "review readability, naming, and adherence to conventions",
                focus: &[
                    "misleading names and inconsistent conventions",
                    "missing or wrong documentation on public surfaces",
                    "formatting that obscures intent",
                ],
            },
        }
    }

    /// Render the analyzer system prompt.
    ///
    /// The prompt pins the output to a JSON object with a `findings` array
    /// and constrains the analyzer to its own category.
    pub fn system_prompt(&self) -> String {
        let category = self.role.category();
        let mut prompt = format!(
            "You are a {persona}. Your job is to {goal} in the provided code diff.\n\n\
             Focus areas:\n",
            persona = self.persona,
            goal = self.goal,
        );
        for item in self.focus {
            prompt.push_str("- ");
            prompt.push_str(item);
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "\nRules:\n\
             - Only report issues you are certain about\n\
             - Only report issues in the \"{category}\" category; ignore everything else\n\
             - Reference file paths and line numbers from the diff\n\
             - Do not speculate about code you cannot see\n\n\
             Respond with a JSON object:\n\
             {{\n\
               \"findings\": [\n\
                 {{\n\
                   \"category\": \"{category}\",\n\
                   \"severity\": \"low\" | \"medium\" | \"high\" | \"critical\",\n\
                   \"file\": \"path/to/file\",\n\
                   \"line\": 42,\n\
                   \"message\": \"Clear explanation of the issue\",\n\
                   \"suggestion\": \"Actionable fix\"\n\
                 }}\n\
               ]\n\
             }}\n\n\
             If you find no issues, return: {{ \"findings\": [] }}"
        ));
        prompt
    }
}
