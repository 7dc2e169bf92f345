//! Subscription gate: pure derivations over a profile row and a project
//! count. No side effects; the numbers come from configuration.

use serde::Serialize;

use crate::config::PlanConfig;
use crate::models::profile::Profile;

#[derive(Debug, Clone, Copy)]
pub struct PlanLimits {
    pub max_projects: i32,
    pub max_transcription_seconds: i32,
}

impl PlanConfig {
    pub fn free_limits(&self) -> PlanLimits {
        PlanLimits {
            max_projects: self.free_max_projects,
            max_transcription_seconds: self.free_max_transcription_seconds,
        }
    }

    pub fn pro_limits(&self) -> PlanLimits {
        PlanLimits {
            max_projects: self.pro_max_projects,
            max_transcription_seconds: self.pro_max_transcription_seconds,
        }
    }
}

pub fn can_create_project(is_pro: bool, project_count: i64, max_projects: i32) -> bool {
    is_pro || project_count < i64::from(max_projects)
}

pub fn can_transcribe(max_transcription_seconds: i32, transcription_seconds_used: i32) -> bool {
    max_transcription_seconds - transcription_seconds_used > 0
}

/// What the UI needs to gate its actions, derived in one place.
#[derive(Debug, Serialize)]
pub struct SubscriptionSummary {
    pub plan: String,
    pub is_pro: bool,
    pub project_count: i64,
    pub max_projects: i32,
    pub can_create_project: bool,
    pub transcription_seconds_used: i32,
    pub max_transcription_seconds: i32,
    pub transcription_seconds_remaining: i32,
    pub can_transcribe: bool,
    pub subscription_status: Option<String>,
}

impl SubscriptionSummary {
    pub fn derive(profile: &Profile, project_count: i64) -> Self {
        let is_pro = profile.is_pro();
        Self {
            plan: profile.plan.clone(),
            is_pro,
            project_count,
            max_projects: profile.max_projects,
            can_create_project: can_create_project(is_pro, project_count, profile.max_projects),
            transcription_seconds_used: profile.transcription_seconds_used,
            max_transcription_seconds: profile.max_transcription_seconds,
            transcription_seconds_remaining: profile.max_transcription_seconds
                - profile.transcription_seconds_used,
            can_transcribe: can_transcribe(
                profile.max_transcription_seconds,
                profile.transcription_seconds_used,
            ),
            subscription_status: profile.subscription_status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn profile(plan: &str, max_projects: i32, used: i32, max_seconds: i32) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: "b@exemple.fr".to_string(),
            full_name: None,
            plan: plan.to_string(),
            max_projects,
            max_transcription_seconds: max_seconds,
            transcription_seconds_used: used,
            stripe_customer_id: None,
            subscription_id: None,
            subscription_status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn free_plan_at_project_limit_cannot_create() {
        let summary = SubscriptionSummary::derive(&profile("free", 1, 0, 7200), 1);
        assert!(!summary.can_create_project);
    }

    #[test]
    fn free_plan_under_limit_can_create() {
        let summary = SubscriptionSummary::derive(&profile("free", 1, 0, 7200), 0);
        assert!(summary.can_create_project);
    }

    #[test]
    fn pro_plan_always_creates_regardless_of_count() {
        let summary = SubscriptionSummary::derive(&profile("pro", 999, 0, 54000), 12345);
        assert!(summary.can_create_project);
    }

    #[test]
    fn transcription_gate_tracks_remaining_seconds() {
        assert!(can_transcribe(7200, 7199));
        assert!(!can_transcribe(7200, 7200));
        assert!(!can_transcribe(7200, 7300)); // over-consumption still gates
    }

    #[test]
    fn limits_come_from_config() {
        let plans = PlanConfig::default();
        assert_eq!(plans.free_limits().max_projects, 1);
        assert_eq!(plans.free_limits().max_transcription_seconds, 7200);
        assert_eq!(plans.pro_limits().max_projects, 999);
        assert_eq!(plans.pro_limits().max_transcription_seconds, 54000);
    }
}
