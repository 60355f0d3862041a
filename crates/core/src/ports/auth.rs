/// Port for the two optional authentication helpers.
///
/// Implementations run the underlying probe on every call; memoization is
/// layered on top by [`crate::auth::AuthAvailability`].
pub trait AuthProbe: Send + Sync {
    /// SSH agent reachable (with or without loaded keys)
    fn ssh_agent(&self) -> bool;

    /// Hosting-provider CLI reports an authenticated session
    fn cli_auth(&self) -> bool;
}
