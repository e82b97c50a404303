//! Protocol version value type.

/// 16-bit protocol version.
///
/// The version appears on the wire in two forms: the plain value and its
/// bitwise inversion in 16-bit two's complement. One connection direction
/// binds the plain form, the other the inverted form; see
/// [`crate::VersionBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShroomVersion(u16);

impl ShroomVersion {
    /// Wrap a raw version number.
    #[must_use]
    pub const fn new(version: u16) -> Self {
        Self(version)
    }

    /// Raw wire value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Bitwise inversion, the form bound to the opposite direction.
    #[must_use]
    pub const fn invert(self) -> Self {
        Self(!self.0)
    }
}

impl From<u16> for ShroomVersion {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl std::fmt::Display for ShroomVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inversion_is_bitwise_not() {
        assert_eq!(ShroomVersion::new(65).invert().raw(), 65470);
        assert_eq!(ShroomVersion::new(95).invert().raw(), !95u16);
    }

    #[test]
    fn inversion_is_involutive() {
        let v = ShroomVersion::new(83);
        assert_eq!(v.invert().invert(), v);
    }
}
