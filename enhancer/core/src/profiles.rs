//! Prompt Profiles
//!
//! A profile is a named transformation intent ("portfolio website",
//! "make this clearer", ...) paired with the fixed system instructions sent
//! to the model. The table is static data: it is built at compile time, never
//! mutated, and shared by reference across every concurrent request.
//!
//! Lookup is total. Any key that is not in the table (including the empty
//! key) resolves to the default profile.

/// A named transformation intent and its model instructions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptProfile {
    /// Stable identifier used on the wire and on the command line
    pub key: &'static str,
    /// Human-readable name for selectors
    pub label: &'static str,
    /// System-level instructions sent with every request using this profile
    pub instructions: &'static str,
}

impl PromptProfile {
    /// Whether this is the fallback profile
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.key == DEFAULT_PROFILE.key
    }
}

/// Profile used for an empty or unrecognized key
pub static DEFAULT_PROFILE: PromptProfile = PromptProfile {
    key: "default",
    label: "General enhancement",
    instructions: "You are an expert prompt engineer.
Transform the user's idea into a detailed, well-structured prompt that any AI can understand and implement.
Add clarity, specificity, and actionable details while preserving the user's original intent.
Make the enhanced prompt comprehensive yet easy to follow.",
};

/// Selectable profiles, in display order
static PROFILES: [PromptProfile; 5] = [
    PromptProfile {
        key: "portfolio",
        label: "Portfolio website",
        instructions: "You are an expert prompt engineer specializing in portfolio website design prompts.
Transform the user's idea into a detailed, comprehensive prompt that an AI can use to build a stunning portfolio website.
Include specific details about:
- Visual design (colors, typography, layout)
- Sections (hero, about, projects, contact)
- Interactive elements and animations
- Responsive behavior
- Modern design patterns
Keep the enhanced prompt clear, actionable, and well-structured.",
    },
    PromptProfile {
        key: "ecommerce",
        label: "E-commerce store",
        instructions: "You are an expert prompt engineer specializing in e-commerce website prompts.
Transform the user's idea into a detailed, comprehensive prompt that an AI can use to build a functional e-commerce store.
Include specific details about:
- Product display and categories
- Shopping cart and checkout flow
- User authentication
- Payment integration considerations
- Search and filtering
- Mobile-first design
Keep the enhanced prompt clear, actionable, and well-structured.",
    },
    PromptProfile {
        key: "startup",
        label: "Startup landing page",
        instructions: "You are an expert prompt engineer specializing in startup landing page prompts.
Transform the user's idea into a detailed, comprehensive prompt that an AI can use to build a conversion-focused landing page.
Include specific details about:
- Hero section with clear value proposition
- Feature highlights
- Social proof and testimonials
- Call-to-action placement
- Lead capture forms
- Modern, professional aesthetics
Keep the enhanced prompt clear, actionable, and well-structured.",
    },
    PromptProfile {
        key: "improve",
        label: "Improve my idea",
        instructions: "You are an expert prompt engineer focused on improving ideas and adding clarity.
Take the user's rough idea and enhance it with:
- More specific details and requirements
- Clear structure and organization
- Technical considerations
- User experience aspects
- Potential edge cases
Transform vague concepts into detailed, actionable specifications.",
    },
    PromptProfile {
        key: "clearer",
        label: "Make this clearer",
        instructions: "You are an expert at simplifying and clarifying complex ideas.
Take the user's input and:
- Remove ambiguity
- Simplify complex concepts
- Add clear, specific language
- Structure the information logically
- Make it easy for any AI to understand and implement
Keep the essence but make it crystal clear.",
    },
];

/// Resolve a profile key
///
/// Matches exactly (case-sensitive). Falls back to [`DEFAULT_PROFILE`] for
/// anything else, so this never fails.
#[must_use]
pub fn resolve(key: &str) -> &'static PromptProfile {
    match PROFILES.iter().find(|p| p.key == key) {
        Some(profile) => profile,
        None => {
            if !key.is_empty() {
                tracing::debug!(key = key, "Unknown profile key, using default");
            }
            &DEFAULT_PROFILE
        }
    }
}

/// All selectable profiles (the default is not listed)
#[must_use]
pub fn profiles() -> &'static [PromptProfile] {
    &PROFILES
}

/// The fallback profile
#[must_use]
pub fn default_profile() -> &'static PromptProfile {
    &DEFAULT_PROFILE
}
