//! Polynomial operations over the BLS12-381 scalar field.
//!
//! Unlike index-based sharing schemes, evaluation points here are arbitrary
//! non-zero scalars (a member's derived identifier), so evaluations carry their
//! `x` coordinate explicitly.

use crate::bls12381::primitives::{
    group::{self, Element, Scalar},
    Error,
};
use rand::RngCore;
use zeroize::Zeroize;

/// Private polynomials are used to generate secret shares.
pub type Private = Poly<group::Private>;

/// Public polynomials represent commitments to secrets on a private polynomial.
pub type Public = Poly<group::Public>;

/// A polynomial evaluation at a specific point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eval<C: Element> {
    pub x: Scalar,
    pub value: C,
}

/// A polynomial that is using a scalar for the variable x and a generic
/// element for the coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
// Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L24-L28
pub struct Poly<C>(Vec<C>);

/// Returns a new scalar polynomial of the given degree where each coefficient is
/// sampled at random from the provided RNG.
///
/// In the context of secret sharing, the threshold is the degree + 1.
pub fn new_from<R: RngCore>(degree: u32, rng: &mut R) -> Poly<Scalar> {
    let coeffs = (0..=degree).map(|_| Scalar::rand(rng)).collect::<Vec<_>>();
    Poly(coeffs)
}

impl<C> Poly<C> {
    /// Creates a new polynomial from the given coefficients.
    pub fn from(c: Vec<C>) -> Self {
        Self(c)
    }

    /// Returns the coefficients, lowest degree first.
    pub fn coefficients(&self) -> &[C] {
        &self.0
    }

    /// Returns the constant term of the polynomial.
    pub fn constant(&self) -> &C {
        &self.0[0]
    }

    /// Returns the degree of the polynomial.
    pub fn degree(&self) -> u32 {
        (self.0.len() - 1) as u32
    }

    /// Returns the number of evaluations required to interpolate the polynomial.
    pub fn required(&self) -> u32 {
        self.0.len() as u32
    }
}

impl<C: Element> Poly<C> {
    /// Commits a scalar polynomial to the group by multiplying each
    /// coefficient with the group's generator.
    pub fn commit(private: &Poly<Scalar>) -> Self {
        let commits = private
            .0
            .iter()
            .map(|c| {
                let mut commitment = C::one();
                commitment.mul(c);
                commitment
            })
            .collect::<Vec<C>>();
        Self(commits)
    }

    /// Returns a zero polynomial.
    pub fn zero() -> Self {
        Self(vec![C::zero()])
    }

    /// Performs polynomial addition in place, padding with zeros if `other`
    /// has a higher degree.
    pub fn add(&mut self, other: &Self) {
        // Reference: https://github.com/celo-org/celo-threshold-bls-rs/blob/a714310be76620e10e8797d6637df64011926430/crates/threshold-bls/src/poly.rs#L87-L95
        if self.0.len() < other.0.len() {
            self.0.resize(other.0.len(), C::zero())
        }
        self.0.iter_mut().zip(&other.0).for_each(|(a, b)| a.add(b))
    }

    /// Evaluates the polynomial at `x` using Horner's method.
    pub fn evaluate(&self, x: &Scalar) -> Eval<C> {
        let value = self.0.iter().rev().fold(C::zero(), |mut sum, coeff| {
            sum.mul(x);
            sum.add(coeff);
            sum
        });
        Eval { x: *x, value }
    }

    /// Recovers the constant term of a polynomial of degree less than `t` from at
    /// least `t` evaluations at distinct points.
    ///
    /// Evaluations are sorted by `x` before the first `t` are selected so that two
    /// invocations over the same set always interpolate the same points.
    pub fn recover<'a, I>(t: u32, evals: I) -> Result<C, Error>
    where
        C: 'a,
        I: IntoIterator<Item = &'a Eval<C>>,
    {
        let t = t as usize;
        let mut evals = evals.into_iter().collect::<Vec<_>>();
        if evals.len() < t {
            return Err(Error::NotEnoughEvaluations(t as u32, evals.len() as u32));
        }
        evals.sort_by_cached_key(|e| e.x.serialize());
        if evals.windows(2).any(|w| w[0].x == w[1].x) {
            return Err(Error::DuplicateEval);
        }
        let selected = &evals[..t];

        // The constant term is `sum_i y_i * l_i(0)` where `l_i(0) = prod_{j != i} x_j / (x_j - x_i)`
        selected
            .iter()
            .enumerate()
            .try_fold(C::zero(), |mut acc, (i, eval_i)| {
                let mut num = Scalar::one();
                let mut den = Scalar::one();
                for (j, eval_j) in selected.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    num.mul(&eval_j.x);
                    let mut diff = eval_j.x;
                    diff.sub(&eval_i.x);
                    den.mul(&diff);
                }
                let inv = den.inverse().ok_or(Error::NoInverse)?;
                num.mul(&inv);

                let mut term = eval_i.value;
                term.mul(&num);
                acc.add(&term);
                Ok(acc)
            })
    }
}

impl Zeroize for Poly<Scalar> {
    fn zeroize(&mut self) {
        self.0.iter_mut().for_each(|c| c.zeroize());
    }
}

/// Returns the public key of the polynomial's constant term.
pub fn public(public: &Public) -> &group::Public {
    public.constant()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls12381::primitives::group::G1;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_evaluate() {
        // f(x) = 5 + 3x + 2x^2
        let poly = Poly::from(vec![
            Scalar::from_u64(5),
            Scalar::from_u64(3),
            Scalar::from_u64(2),
        ]);
        assert_eq!(poly.evaluate(&Scalar::zero()).value, Scalar::from_u64(5));
        assert_eq!(poly.evaluate(&Scalar::one()).value, Scalar::from_u64(10));
        assert_eq!(poly.evaluate(&Scalar::from_u64(2)).value, Scalar::from_u64(19));
    }

    #[test]
    fn test_commitment_matches_evaluation() {
        let mut rng = StdRng::seed_from_u64(0);
        let private = new_from(2, &mut rng);
        let public = Public::commit(&private);
        assert_eq!(public.required(), 3);

        for i in 1..=5u64 {
            let x = Scalar::from_u64(i * 7919);
            let share = private.evaluate(&x).value;
            let mut expected = G1::one();
            expected.mul(&share);
            assert_eq!(public.evaluate(&x).value, expected);
        }
    }

    #[test]
    fn test_addition_pads() {
        let mut a = Poly::from(vec![Scalar::from_u64(1)]);
        let b = Poly::from(vec![Scalar::from_u64(2), Scalar::from_u64(3)]);
        a.add(&b);
        assert_eq!(
            a.coefficients(),
            &[Scalar::from_u64(3), Scalar::from_u64(3)]
        );
        assert_eq!(a.degree(), 1);
    }

    #[test]
    fn test_recover_any_subset() {
        let mut rng = StdRng::seed_from_u64(1);
        let private = new_from(2, &mut rng);
        let evals = (1..=6u64)
            .map(|i| private.evaluate(&Scalar::from_u64(i * 31)))
            .collect::<Vec<_>>();

        let secret = Poly::recover(3, &evals[..3]).unwrap();
        assert_eq!(&secret, private.constant());
        let secret = Poly::recover(3, &evals[3..]).unwrap();
        assert_eq!(&secret, private.constant());
        let secret = Poly::recover(3, evals.iter().rev()).unwrap();
        assert_eq!(&secret, private.constant());
    }

    #[test]
    fn test_recover_insufficient() {
        let mut rng = StdRng::seed_from_u64(2);
        let private = new_from(2, &mut rng);
        let evals = (1..=2u64)
            .map(|i| private.evaluate(&Scalar::from_u64(i)))
            .collect::<Vec<_>>();
        assert!(matches!(
            Poly::recover(3, &evals),
            Err(Error::NotEnoughEvaluations(3, 2))
        ));
    }

    #[test]
    fn test_recover_duplicate() {
        let mut rng = StdRng::seed_from_u64(3);
        let private = new_from(2, &mut rng);
        let mut evals = (1..=3u64)
            .map(|i| private.evaluate(&Scalar::from_u64(i)))
            .collect::<Vec<_>>();
        evals.push(evals[0]);
        assert!(matches!(
            Poly::recover(3, &evals),
            Err(Error::DuplicateEval)
        ));
    }
}
