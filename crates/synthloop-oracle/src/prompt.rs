//! Prompt profiles.
//!
//! A profile fixes the system prompts and message layout for the three
//! oracle requests. `General` targets plain Python functions checked with
//! pytest; `Manim` targets animation scenes.

use serde::{Deserialize, Serialize};
use synthloop_core::{ExecutionResult, Specification};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptProfile {
    #[default]
    General,
    Manim,
}

const GENERAL_TEST_SYSTEM: &str = "\
You are an assistant that writes pytest test suites.
1. Think about what behaviour needs to be checked.
2. Write focused, isolated pytest test functions.
3. Start with basic cases and move on to edge cases.
4. Do not implement the code under test and do not import it; its names are already in scope.
Reply with a single Python code block.";

const GENERAL_IMPLEMENTATION_SYSTEM: &str = "\
You are an assistant that writes Python code to make a given pytest suite pass.
1. Think about the solution before writing it.
2. Handle the edge cases the tests exercise.
3. Write clean, self-contained code without test functions.
4. Fix every failure reported for previous attempts.
Reply with a single Python code block.";

const GENERAL_DIAGNOSIS_SYSTEM: &str = "\
You are a Python expert. Analyze these test failures and give short, specific guidance for fixing the implementation.";

const MANIM_TEST_SYSTEM: &str = "\
You are an expert Manim developer creating pytest tests.
Create precise tests that verify:
1. Scene initialization and structure
2. Correct creation of the requested objects
3. Proper mathematical text rendering with MathTex
4. Animation sequence and transformations
5. Final state of the scene
Do not add constraints the request does not ask for.
Reply with a single Python code block.";

const MANIM_IMPLEMENTATION_SYSTEM: &str = r#"You are an expert Manim developer.
Create a precise, working implementation following these guidelines:
1. Use proper Manim syntax and conventions
2. Create smooth animations with appropriate timing
3. Position objects carefully using next_to() or move_to()
4. Use MathTex for mathematical formulas with proper escaping
5. Handle transformations with self.play()
6. Consider the viewing window and object scales
7. Make sure every f-string is well formed
8. Use raw strings (r"...") for LaTeX expressions

Example of correct MathTex and f-string usage:
final_det_text = MathTex(r"\text{Final det} = " + f"{final_det:.2f}")
Reply with a single Python code block."#;

const MANIM_DIAGNOSIS_SYSTEM: &str = "\
You are a Manim expert. Analyze these test failures and provide specific guidance for fixing Manim animations.";

impl PromptProfile {
    pub fn test_system(&self) -> &'static str {
        match self {
            PromptProfile::General => GENERAL_TEST_SYSTEM,
            PromptProfile::Manim => MANIM_TEST_SYSTEM,
        }
    }

    pub fn implementation_system(&self) -> &'static str {
        match self {
            PromptProfile::General => GENERAL_IMPLEMENTATION_SYSTEM,
            PromptProfile::Manim => MANIM_IMPLEMENTATION_SYSTEM,
        }
    }

    pub fn diagnosis_system(&self) -> &'static str {
        match self {
            PromptProfile::General => GENERAL_DIAGNOSIS_SYSTEM,
            PromptProfile::Manim => MANIM_DIAGNOSIS_SYSTEM,
        }
    }

    pub fn test_request(&self, specification: &Specification) -> String {
        match self {
            PromptProfile::General => format!("Write pytest tests for: {specification}"),
            PromptProfile::Manim => {
                format!("Write pytest tests for this Manim animation: {specification}")
            }
        }
    }

    pub fn implementation_request(
        &self,
        specification: &Specification,
        test_text: &str,
        context: &str,
    ) -> String {
        let subject = match self {
            PromptProfile::General => "Implement code to satisfy this request",
            PromptProfile::Manim => "Create a Manim implementation for",
        };
        let mut request = format!(
            "{subject}: {specification}\n\nPrevious attempts context:\n{context}\n\nThe test code is:\n{test_text}\n"
        );
        if *self == PromptProfile::Manim {
            request.push_str(
                "\nImportant: ensure proper f-string syntax and LaTeX escaping in all text elements.\n",
            );
        }
        request
    }

    pub fn diagnosis_request(&self, result: &ExecutionResult) -> String {
        let focus = match self {
            PromptProfile::General => {
                "1. Which assertions fail and why\n2. Missing or wrong behaviour\n3. Edge cases not handled"
            }
            PromptProfile::Manim => {
                "1. Animation sequence issues\n2. Object transformation problems\n3. Mathematical accuracy issues\n4. Scene composition problems"
            }
        };
        format!(
            "Analyze these test failures:\n\nFailed Tests:\n{}\n\nTest Output:\n{}\n\nDomain Errors:\n{}\n\nProvide specific guidance on:\n{focus}\n",
            result.failed_test_ids().join(", "),
            result.raw_output(),
            result.domain_errors().join("\n"),
        )
    }
}

impl std::str::FromStr for PromptProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(PromptProfile::General),
            "manim" => Ok(PromptProfile::Manim),
            other => Err(format!("unknown prompt profile: {other}")),
        }
    }
}
