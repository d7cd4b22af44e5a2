//! Ordered task × tier routing table.
//!
//! Rules are evaluated top to bottom and the first match wins. The final
//! rule matches everything, so a well-formed table always yields a route.

use serde::Serialize;

use super::types::ProviderKind::{self, ClaudeStandard, OpenAiFull, OpenAiMini};
use super::types::TaskCategory::{
    self, CodeAnalysis, DocumentAnalysis, IdeaGeneration, MarketResearch, ProjectPlanning,
};
use super::types::{RouteDecision, Tier};
use crate::config::MissingCredentialPolicy;
use crate::error::{Error, Result};

const PAID: &[Tier] = &[Tier::Basic, Tier::Premium];
const BASIC: &[Tier] = &[Tier::Basic];
const PREMIUM: &[Tier] = &[Tier::Premium];
const ANY_TIER: &[Tier] = &[];

/// A single routing rule.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteRule {
    /// `None` matches every task.
    pub task: Option<TaskCategory>,
    /// Empty matches every tier.
    pub tiers: &'static [Tier],
    /// Rule only applies when the secondary provider has a credential.
    pub requires_secondary: bool,
    /// A paid feature: a missing secondary credential is an error under
    /// [`MissingCredentialPolicy::Fail`] instead of a reason to skip.
    pub gated: bool,
    pub provider: ProviderKind,
    pub web_search: bool,
    pub extended_thinking: bool,
}

impl RouteRule {
    const fn to(task: Option<TaskCategory>, tiers: &'static [Tier], provider: ProviderKind) -> Self {
        Self {
            task,
            tiers,
            requires_secondary: false,
            gated: false,
            provider,
            web_search: false,
            extended_thinking: false,
        }
    }

    const fn secondary(mut self) -> Self {
        self.requires_secondary = true;
        self
    }

    const fn gated(mut self) -> Self {
        self.requires_secondary = true;
        self.gated = true;
        self
    }

    const fn web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    const fn extended_thinking(mut self) -> Self {
        self.extended_thinking = true;
        self
    }

    pub fn matches(&self, task: TaskCategory, tier: Tier) -> bool {
        self.task.map_or(true, |t| t == task) && (self.tiers.is_empty() || self.tiers.contains(&tier))
    }

    pub fn decision(&self) -> RouteDecision {
        RouteDecision::new(self.provider)
            .with_web_search(self.web_search)
            .with_extended_thinking(self.extended_thinking)
    }
}

/// The production routing table.
pub const ROUTE_RULES: &[RouteRule] = &[
    RouteRule::to(Some(MarketResearch), PAID, OpenAiMini).web_search(),
    RouteRule::to(Some(MarketResearch), ANY_TIER, OpenAiMini),
    RouteRule::to(Some(DocumentAnalysis), PREMIUM, ClaudeStandard).gated(),
    RouteRule::to(Some(DocumentAnalysis), ANY_TIER, OpenAiMini),
    RouteRule::to(Some(ProjectPlanning), PREMIUM, ClaudeStandard)
        .gated()
        .extended_thinking(),
    RouteRule::to(Some(ProjectPlanning), BASIC, OpenAiFull),
    RouteRule::to(Some(ProjectPlanning), ANY_TIER, OpenAiMini),
    RouteRule::to(Some(CodeAnalysis), PREMIUM, ClaudeStandard).secondary(),
    RouteRule::to(Some(CodeAnalysis), ANY_TIER, OpenAiMini),
    RouteRule::to(Some(IdeaGeneration), PREMIUM, OpenAiFull),
    RouteRule::to(Some(IdeaGeneration), ANY_TIER, OpenAiMini),
    // Basic chat and anything unrecognized stay on the cheapest model.
    RouteRule::to(None, ANY_TIER, OpenAiMini),
];

/// Facts about the environment that affect rule eligibility.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext {
    pub secondary_available: bool,
    pub policy: MissingCredentialPolicy,
}

/// Pick the route for a task and tier from `rules`.
pub fn select_route(
    rules: &[RouteRule],
    task: TaskCategory,
    tier: Tier,
    ctx: SelectionContext,
) -> Result<RouteDecision> {
    for rule in rules.iter().filter(|r| r.matches(task, tier)) {
        if rule.requires_secondary && !ctx.secondary_available {
            if rule.gated && ctx.policy == MissingCredentialPolicy::Fail {
                tracing::warn!(
                    task = %task,
                    tier = %tier,
                    provider = %rule.provider,
                    "Premium route requires a secondary credential that is not configured"
                );
                return Err(Error::MissingCredential {
                    task: Some(task),
                    provider: rule.provider,
                });
            }
            tracing::debug!(
                task = %task,
                provider = %rule.provider,
                "Secondary credential missing, falling back"
            );
            continue;
        }

        return Ok(rule.decision());
    }

    Err(Error::Internal(format!(
        "No routing rule matched task '{}' for tier '{}'",
        task, tier
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(secondary_available: bool, policy: MissingCredentialPolicy) -> SelectionContext {
        SelectionContext {
            secondary_available,
            policy,
        }
    }

    fn route(task: TaskCategory, tier: Tier, secondary: bool) -> RouteDecision {
        select_route(
            ROUTE_RULES,
            task,
            tier,
            ctx(secondary, MissingCredentialPolicy::Fallback),
        )
        .unwrap()
    }

    #[test]
    fn test_basic_chat_free() {
        let r = route(TaskCategory::BasicChat, Tier::Free, true);
        assert_eq!(r.provider, ProviderKind::OpenAiMini);
        assert_eq!(r.model, "gpt-4o-mini");
        assert!(!r.web_search);
        assert!(!r.extended_thinking);
    }

    #[test]
    fn test_basic_chat_never_upgrades() {
        for tier in Tier::ALL {
            assert_eq!(
                route(TaskCategory::BasicChat, tier, true).provider,
                ProviderKind::OpenAiMini
            );
        }
    }

    #[test]
    fn test_market_research_web_search_by_tier() {
        let premium = route(TaskCategory::MarketResearch, Tier::Premium, false);
        assert_eq!(premium.provider, ProviderKind::OpenAiMini);
        assert!(premium.web_search);

        assert!(route(TaskCategory::MarketResearch, Tier::Basic, false).web_search);
        assert!(!route(TaskCategory::MarketResearch, Tier::Free, true).web_search);
    }

    #[test]
    fn test_document_analysis_premium_gating() {
        assert_eq!(
            route(TaskCategory::DocumentAnalysis, Tier::Premium, true).provider,
            ProviderKind::ClaudeStandard
        );
        assert_eq!(
            route(TaskCategory::DocumentAnalysis, Tier::Premium, false).provider,
            ProviderKind::OpenAiMini
        );
        assert_eq!(
            route(TaskCategory::DocumentAnalysis, Tier::Basic, true).provider,
            ProviderKind::OpenAiMini
        );
    }

    #[test]
    fn test_project_planning_branches() {
        let premium = route(TaskCategory::ProjectPlanning, Tier::Premium, true);
        assert_eq!(premium.provider, ProviderKind::ClaudeStandard);
        assert!(premium.extended_thinking);

        assert_eq!(
            route(TaskCategory::ProjectPlanning, Tier::Basic, true).provider,
            ProviderKind::OpenAiFull
        );
        assert_eq!(
            route(TaskCategory::ProjectPlanning, Tier::Free, true).provider,
            ProviderKind::OpenAiMini
        );
        let degraded = route(TaskCategory::ProjectPlanning, Tier::Premium, false);
        assert_eq!(degraded.provider, ProviderKind::OpenAiMini);
        assert!(!degraded.extended_thinking);
    }

    #[test]
    fn test_code_analysis_has_no_extended_thinking() {
        let r = route(TaskCategory::CodeAnalysis, Tier::Premium, true);
        assert_eq!(r.provider, ProviderKind::ClaudeStandard);
        assert!(!r.extended_thinking);
        assert_eq!(
            route(TaskCategory::CodeAnalysis, Tier::Basic, true).provider,
            ProviderKind::OpenAiMini
        );
    }

    #[test]
    fn test_idea_generation() {
        assert_eq!(
            route(TaskCategory::IdeaGeneration, Tier::Premium, false).provider,
            ProviderKind::OpenAiFull
        );
        assert_eq!(
            route(TaskCategory::IdeaGeneration, Tier::Basic, true).provider,
            ProviderKind::OpenAiMini
        );
    }

    #[test]
    fn test_every_pair_yields_a_defined_route() {
        for task in TaskCategory::ALL {
            for tier in Tier::ALL {
                for secondary in [false, true] {
                    let r = route(task, tier, secondary);
                    assert_eq!(r.model, r.provider.model());
                    if !secondary {
                        assert_ne!(r.provider, ProviderKind::ClaudeStandard);
                    }
                    if tier != Tier::Premium {
                        assert_ne!(r.provider, ProviderKind::ClaudeStandard);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fail_policy_surfaces_missing_credential_for_gated_tasks() {
        let strict = ctx(false, MissingCredentialPolicy::Fail);
        for task in [TaskCategory::DocumentAnalysis, TaskCategory::ProjectPlanning] {
            let result = select_route(ROUTE_RULES, task, Tier::Premium, strict);
            assert!(matches!(
                result,
                Err(Error::MissingCredential {
                    task: Some(t),
                    provider: ProviderKind::ClaudeStandard
                }) if t == task
            ));
        }

        // Code analysis is not gated and still falls back.
        let code = select_route(ROUTE_RULES, TaskCategory::CodeAnalysis, Tier::Premium, strict);
        assert_eq!(code.unwrap().provider, ProviderKind::OpenAiMini);

        // Non-premium tiers never reach the gated rule.
        let basic = select_route(ROUTE_RULES, TaskCategory::DocumentAnalysis, Tier::Basic, strict);
        assert_eq!(basic.unwrap().provider, ProviderKind::OpenAiMini);
    }

    #[test]
    fn test_table_without_catch_all_reports_internal_error() {
        let rules = &ROUTE_RULES[..2];
        let result = select_route(
            rules,
            TaskCategory::BasicChat,
            Tier::Free,
            ctx(true, MissingCredentialPolicy::Fallback),
        );
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn test_last_rule_is_catch_all() {
        let last = ROUTE_RULES.last().unwrap();
        assert!(last.task.is_none());
        assert!(last.tiers.is_empty());
        assert!(!last.requires_secondary);
    }
}
