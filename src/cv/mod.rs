//! Collective variables: reduced coordinates and their Jacobians.
//!
//! A CV maps particle positions to a value `xi ∈ R^d` together with the
//! Jacobian `∂xi/∂r` laid out as a `d × 3N` matrix (atom-major, then x/y/z).
//! Multi-dimensional CVs are composed with [`Stacked`].

use nalgebra::{DMatrix, DVector, Vector3};

use crate::error::AbfError;

/// Value and Jacobian of a collective variable at one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CvValue {
    pub xi: DVector<f64>,
    /// `dims × 3·natoms`.
    pub jacobian: DMatrix<f64>,
}

/// A (possibly multi-dimensional) function of particle positions.
pub trait CollectiveVariable: std::fmt::Debug + Send + Sync {
    /// Number of CV components.
    fn dims(&self) -> usize;

    fn evaluate(&self, positions: &[Vector3<f64>]) -> Result<CvValue, AbfError>;
}

impl<C: CollectiveVariable + ?Sized> CollectiveVariable for Box<C> {
    fn dims(&self) -> usize {
        (**self).dims()
    }

    fn evaluate(&self, positions: &[Vector3<f64>]) -> Result<CvValue, AbfError> {
        (**self).evaluate(positions)
    }
}

/// One Cartesian coordinate of one atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub atom: usize,
    /// 0 = x, 1 = y, 2 = z.
    pub axis: usize,
}

impl Component {
    pub fn new(atom: usize, axis: usize) -> Self {
        Self { atom, axis }
    }
}

impl CollectiveVariable for Component {
    fn dims(&self) -> usize {
        1
    }

    fn evaluate(&self, positions: &[Vector3<f64>]) -> Result<CvValue, AbfError> {
        if self.axis > 2 {
            return Err(AbfError::configuration(format!(
                "component axis must be 0, 1 or 2 (got {})",
                self.axis
            )));
        }
        let r = atom(positions, self.atom)?;

        let mut jacobian = DMatrix::zeros(1, 3 * positions.len());
        jacobian[(0, 3 * self.atom + self.axis)] = 1.0;
        Ok(CvValue {
            xi: DVector::from_element(1, r[self.axis]),
            jacobian,
        })
    }
}

/// Euclidean distance between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distance {
    pub first: usize,
    pub second: usize,
}

impl Distance {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }
}

impl CollectiveVariable for Distance {
    fn dims(&self) -> usize {
        1
    }

    fn evaluate(&self, positions: &[Vector3<f64>]) -> Result<CvValue, AbfError> {
        if self.first == self.second {
            return Err(AbfError::configuration("distance CV needs two distinct atoms"));
        }
        let rij = atom(positions, self.first)? - atom(positions, self.second)?;
        let r = rij.norm();
        if r <= f64::EPSILON {
            return Err(AbfError::numerical(format!(
                "distance between atoms {} and {} is zero; its gradient is undefined",
                self.first, self.second
            )));
        }

        let unit = rij / r;
        let mut jacobian = DMatrix::zeros(1, 3 * positions.len());
        for k in 0..3 {
            jacobian[(0, 3 * self.first + k)] = unit[k];
            jacobian[(0, 3 * self.second + k)] = -unit[k];
        }
        Ok(CvValue {
            xi: DVector::from_element(1, r),
            jacobian,
        })
    }
}

/// Several CVs concatenated into one multi-dimensional CV.
#[derive(Debug, Default)]
pub struct Stacked {
    parts: Vec<Box<dyn CollectiveVariable>>,
}

impl Stacked {
    pub fn new(parts: Vec<Box<dyn CollectiveVariable>>) -> Self {
        Self { parts }
    }

    pub fn push(mut self, cv: impl CollectiveVariable + 'static) -> Self {
        self.parts.push(Box::new(cv));
        self
    }
}

impl CollectiveVariable for Stacked {
    fn dims(&self) -> usize {
        self.parts.iter().map(|cv| cv.dims()).sum()
    }

    fn evaluate(&self, positions: &[Vector3<f64>]) -> Result<CvValue, AbfError> {
        let dims = self.dims();
        let mut xi = DVector::zeros(dims);
        let mut jacobian = DMatrix::zeros(dims, 3 * positions.len());

        let mut row = 0;
        for cv in &self.parts {
            let part = cv.evaluate(positions)?;
            let n = part.xi.len();
            xi.rows_mut(row, n).copy_from(&part.xi);
            jacobian.rows_mut(row, n).copy_from(&part.jacobian);
            row += n;
        }
        Ok(CvValue { xi, jacobian })
    }
}

fn atom(positions: &[Vector3<f64>], index: usize) -> Result<Vector3<f64>, AbfError> {
    positions.get(index).copied().ok_or_else(|| {
        AbfError::configuration(format!(
            "CV references atom {index} but the snapshot has {} atoms",
            positions.len()
        ))
    })
}

/// Flatten per-particle vectors into a `3N` column (atom-major).
pub fn flatten(vectors: &[Vector3<f64>]) -> DVector<f64> {
    DVector::from_iterator(3 * vectors.len(), vectors.iter().flat_map(|v| v.iter().copied()))
}

/// Inverse of [`flatten`].
pub fn unflatten(values: &DVector<f64>) -> Vec<Vector3<f64>> {
    values
        .as_slice()
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect()
}
