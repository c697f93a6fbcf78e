#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Whether `POST /auth/register/admin` may create administrators.
    pub allow_admin_registration: bool,
}
