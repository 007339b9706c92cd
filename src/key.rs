//! Composite `(major, minor)` key.

/// The coordinate a value is stored under.
///
/// Equality and hashing are component-wise. No ordering is defined;
/// the map never sorts keys.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompositeKey<M, N> {
    pub major: M,
    pub minor: N,
}

impl<M, N> CompositeKey<M, N> {
    pub const fn new(major: M, minor: N) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> &M {
        &self.major
    }

    pub fn minor(&self) -> &N {
        &self.minor
    }

    pub fn borrowed(&self) -> CompositeKey<&M, &N> {
        CompositeKey {
            major: &self.major,
            minor: &self.minor,
        }
    }

    pub fn into_parts(self) -> (M, N) {
        (self.major, self.minor)
    }
}

impl<M: Clone, N: Clone> CompositeKey<&M, &N> {
    pub fn cloned(&self) -> CompositeKey<M, N> {
        CompositeKey {
            major: self.major.clone(),
            minor: self.minor.clone(),
        }
    }
}

impl<M, N> From<(M, N)> for CompositeKey<M, N> {
    fn from((major, minor): (M, N)) -> Self {
        Self { major, minor }
    }
}

impl<M, N> From<CompositeKey<M, N>> for (M, N) {
    fn from(k: CompositeKey<M, N>) -> Self {
        k.into_parts()
    }
}
