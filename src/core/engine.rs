//! State Engine: integrates the identity dynamics
//!
//! dw/dt = −D·L·w + r(w) − λ(w − w*) + F_m(e)
//! dm/dt = −μ(m − w)
//!
//! with r(u) = u(1 − u)(u − a). One call to `step` is one explicit Euler
//! step followed by a coordinate-wise clamp to [0, 1].
//!
//! Lyapunov function:
//! ℰ = D/2·wᵀLw + Σ V(w_i) + λ/2‖w − w*‖² + κ/2‖w − m‖²
//! V(u) = u⁴/4 − (1 + a)u³/3 + a·u²/2   (V' = −r)

use serde::{Deserialize, Serialize};

use crate::core::filter::derive_filter;
use crate::error::IdentityError;
use crate::types::{Laplacian, NumericDivergence, Parameters, SelfState, StabilityEstimate, Vocabulary};

/// Result of a single integration step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: SelfState,
    /// Present when the raw Euler step left [0, 1] and was clamped
    pub divergence: Option<NumericDivergence>,
}

/// Result of a fixed-point search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedPointResult {
    /// Last state reached (an approximation when not converged)
    pub state: SelfState,
    pub converged: bool,
    pub iterations: usize,
}

/// Deterministic integrator bound to one vocabulary and parameter set
#[derive(Debug, Clone)]
pub struct StateEngine {
    laplacian: Laplacian,
    params: Parameters,
}

impl StateEngine {
    /// Build an engine. The Laplacian is computed once here.
    pub fn new(vocabulary: &Vocabulary, params: Parameters) -> Result<Self, IdentityError> {
        params.validate(vocabulary.len())?;
        Ok(Self {
            laplacian: vocabulary.compute_laplacian(),
            params,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn dimension(&self) -> usize {
        self.laplacian.dimension()
    }

    /// One Euler step of size `dt` under `experience`
    pub fn step(
        &self,
        state: &SelfState,
        experience: &[f64],
        dt: f64,
    ) -> Result<StepOutcome, IdentityError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(IdentityError::InvalidTimeStep(dt));
        }
        let n = self.dimension();
        state.validate(n)?;
        if experience.len() != n {
            return Err(IdentityError::DimensionMismatch {
                expected: n,
                actual: experience.len(),
            });
        }

        let p = &self.params;
        let filter = derive_filter(&state.m, p.filter_sharpness, p.filter_gain);
        let force = filter.apply(experience)?;
        let lw = self.laplacian.apply(&state.w);

        let mut divergence = NumericDivergence::default();
        let mut w = Vec::with_capacity(n);
        let mut m = Vec::with_capacity(n);

        for i in 0..n {
            let wi = state.w[i];
            let mi = state.m[i];

            let dw = -p.diffusion * lw[i] + reaction(wi, p.bistability)
                - p.homeostasis * (wi - p.target[i])
                + force[i];
            let dm = -p.self_model_rate * (mi - wi);

            let (w_next, w_excess) = clamp_unit(wi + dt * dw, wi);
            let (m_next, m_excess) = clamp_unit(mi + dt * dm, mi);

            if let Some(excess) = w_excess {
                divergence.w.push(i);
                divergence.max_excess = divergence.max_excess.max(excess);
            }
            if let Some(excess) = m_excess {
                divergence.m.push(i);
                divergence.max_excess = divergence.max_excess.max(excess);
            }
            w.push(w_next);
            m.push(m_next);
        }

        let divergence = if divergence.is_empty() {
            None
        } else {
            tracing::warn!(
                clamped = divergence.count(),
                max_excess = divergence.max_excess,
                "evolution step left [0, 1]; clamped"
            );
            Some(divergence)
        };

        Ok(StepOutcome {
            state: SelfState {
                w,
                m,
                time: state.time + dt,
            },
            divergence,
        })
    }

    /// `step` without the divergence report
    pub fn evolve(
        &self,
        state: &SelfState,
        experience: &[f64],
        dt: f64,
    ) -> Result<SelfState, IdentityError> {
        self.step(state, experience, dt).map(|outcome| outcome.state)
    }

    /// ℰ(w, m)
    pub fn compute_energy(&self, state: &SelfState) -> f64 {
        let p = &self.params;
        let diffusion = 0.5 * p.diffusion * self.laplacian.quadratic_form(&state.w);
        let potential: f64 = state.w.iter().map(|&u| potential(u, p.bistability)).sum();
        let homeostasis: f64 = state
            .w
            .iter()
            .zip(&p.target)
            .map(|(w, t)| (w - t) * (w - t))
            .sum::<f64>()
            * 0.5
            * p.homeostasis;
        let gap = state.coherence();
        let coherence = 0.5 * p.coherence_weight * gap * gap;

        diffusion + potential + homeostasis + coherence
    }

    /// Iterate zero-experience steps of size `dt` until the max coordinate
    /// change drops below `tol`, or `max_iter` steps have run.
    pub fn find_fixed_point(
        &self,
        state: &SelfState,
        dt: f64,
        max_iter: usize,
        tol: f64,
    ) -> Result<FixedPointResult, IdentityError> {
        let zero = vec![0.0; self.dimension()];
        let mut current = state.clone();

        for iteration in 1..=max_iter {
            let next = self.evolve(&current, &zero, dt)?;
            let change = next.max_abs_change(&current);
            current = next;
            if change < tol {
                tracing::debug!(iterations = iteration, "fixed point converged");
                return Ok(FixedPointResult {
                    state: current,
                    converged: true,
                    iterations: iteration,
                });
            }
        }

        tracing::debug!(max_iter, "fixed point search hit iteration cap");
        Ok(FixedPointResult {
            state: current,
            converged: false,
            iterations: max_iter,
        })
    }

    /// Gershgorin bound on the Jacobian spectrum at `state`.
    ///
    /// The Jacobian is block lower-triangular (∂ṁ/∂m = −μI, ∂ẇ/∂m = 0), so
    /// the discs are taken over the w-block and −μ is added separately.
    pub fn estimate_stability(&self, state: &SelfState) -> StabilityEstimate {
        let p = &self.params;
        let mut bound = f64::NEG_INFINITY;
        let mut critical = 0;

        for (i, &wi) in state.w.iter().enumerate() {
            let centre = -p.diffusion * self.laplacian.get(i, i)
                + reaction_slope(wi, p.bistability)
                - p.homeostasis;
            let radius = p.diffusion.abs() * self.laplacian.off_diagonal_abs_sum(i);
            if centre + radius > bound {
                bound = centre + radius;
                critical = i;
            }
        }

        StabilityEstimate {
            spectral_bound: bound.max(-p.self_model_rate),
            critical_dimension: critical,
        }
    }
}

/// r(u) = u(1 − u)(u − a)
pub fn reaction(u: f64, a: f64) -> f64 {
    u * (1.0 - u) * (u - a)
}

/// r'(u) = −3u² + 2(1 + a)u − a
pub fn reaction_slope(u: f64, a: f64) -> f64 {
    -3.0 * u * u + 2.0 * (1.0 + a) * u - a
}

/// V(u) = u⁴/4 − (1 + a)u³/3 + a·u²/2
pub fn potential(u: f64, a: f64) -> f64 {
    let u2 = u * u;
    u2 * u2 / 4.0 - (1.0 + a) * u2 * u / 3.0 + a * u2 / 2.0
}

/// Clamp to [0, 1]. Returns the excess when clamping happened; a
/// non-finite value falls back to `previous`.
fn clamp_unit(value: f64, previous: f64) -> (f64, Option<f64>) {
    if !value.is_finite() {
        return (previous, Some(f64::INFINITY));
    }
    if value < 0.0 {
        (0.0, Some(-value))
    } else if value > 1.0 {
        (1.0, Some(value - 1.0))
    } else {
        (value, None)
    }
}

// =============================================================================
// TESTS
// =============================================================================
