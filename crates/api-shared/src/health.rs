use crate::dto::HealthRes;

/// Health check for the REST server.
pub struct HealthService;

impl HealthService {
    /// Same body the prediction backend answers on its own `/health` route, so the dashboard
    /// server can itself be listed as a candidate host by health probes.
    pub fn check_health() -> HealthRes {
        HealthRes {
            status: "ok".into(),
        }
    }
}
