/// Account privilege bits as stored in `users.priv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Privileges(pub i32);

impl Privileges {
    /// Set for accounts in good standing. Restricted accounts never
    /// appear on leaderboards.
    pub const UNRESTRICTED: i32 = 1 << 0;
    pub const VERIFIED: i32 = 1 << 1;

    pub fn is_unrestricted(self) -> bool {
        self.0 & Self::UNRESTRICTED != 0
    }
}
