use std::ops::{Add, Sub, Mul, Div};
use crate::error::Error;
use crate::index_space::Axis;
use crate::state::StateLayout;




// ============================================================================
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conserved(f64, f64, f64, f64, f64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primitive(f64, f64, f64, f64, f64);




// ============================================================================
impl Conserved {

    /// Read the mass, momenta and total energy from one zone of a hydro
    /// state laid out by [`StateLayout`].
    pub fn from_slice(u: &[f64]) -> Self {
        Self(
            u[StateLayout::DENSITY],
            u[StateLayout::XMOM],
            u[StateLayout::YMOM],
            u[StateLayout::ZMOM],
            u[StateLayout::EDEN])
    }

    pub fn write_to_slice(&self, u: &mut [f64]) {
        u[StateLayout::DENSITY] = self.0;
        u[StateLayout::XMOM] = self.1;
        u[StateLayout::YMOM] = self.2;
        u[StateLayout::ZMOM] = self.3;
        u[StateLayout::EDEN] = self.4;
    }

    pub fn mass_density(&self) -> f64 {
        self.0
    }

    pub fn momentum(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.1,
            Axis::J => self.2,
        }
    }

    pub fn energy_density(&self) -> f64 {
        self.4
    }

    pub fn momentum_squared(&self) -> f64 {
        self.1 * self.1 + self.2 * self.2 + self.3 * self.3
    }

    pub fn to_primitive(&self, gamma_law_index: f64) -> Result<Primitive, Error> {
        let ek = 0.5 * self.momentum_squared() / self.mass_density();
        let et = self.energy_density() - ek;
        let pg = et * (gamma_law_index - 1.0);

        if self.mass_density() <= 0.0 {
            Err(Error::NegativeMassDensity(self.mass_density()))
        } else if pg < 0.0 {
            Err(Error::NegativeGasPressure(pg))
        } else {
            let d = self.mass_density();
            Ok(Primitive(d, self.1 / d, self.2 / d, self.3 / d, pg))
        }
    }
}




// ============================================================================
impl Primitive {

    pub fn new(d: f64, v1: f64, v2: f64, v3: f64, p: f64) -> Self {
        Self(d, v1, v2, v3, p)
    }

    pub fn mass_density(&self) -> f64 {
        self.0
    }

    pub fn gas_pressure(&self) -> f64 {
        self.4
    }

    pub fn velocity(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.1,
            Axis::J => self.2,
        }
    }

    pub fn velocity_squared(&self) -> f64 {
        self.1 * self.1 + self.2 * self.2 + self.3 * self.3
    }

    pub fn sound_speed_squared(&self, gamma_law_index: f64) -> f64 {
        gamma_law_index * self.gas_pressure() / self.mass_density()
    }

    pub fn specific_internal_energy(&self, gamma_law_index: f64) -> f64 {
        self.gas_pressure() / self.mass_density() / (gamma_law_index - 1.0)
    }

    pub fn outer_wavespeeds(&self, axis: Axis, gamma_law_index: f64) -> (f64, f64) {
        let cs = self.sound_speed_squared(gamma_law_index).sqrt();
        let vn = self.velocity(axis);
        (vn - cs, vn + cs)
    }

    /// The largest signal speed along the given axis, `|v_n| + c_s`.
    pub fn max_signal_speed(&self, axis: Axis, gamma_law_index: f64) -> f64 {
        self.velocity(axis).abs() + self.sound_speed_squared(gamma_law_index).sqrt()
    }

    pub fn to_conserved(&self, gamma_law_index: f64) -> Conserved {
        let d   = self.mass_density();
        let p   = self.gas_pressure();
        let vsq = self.velocity_squared();

        Conserved(
            d,
            d * self.1,
            d * self.2,
            d * self.3,
            d * vsq * 0.5 + p / (gamma_law_index - 1.0)
        )
    }

    pub fn flux_vector(&self, axis: Axis, gamma_law_index: f64) -> Conserved {
        let pg = self.gas_pressure();
        let vn = self.velocity(axis);
        let u = self.to_conserved(gamma_law_index);
        let (ni, nj) = match axis {
            Axis::I => (1.0, 0.0),
            Axis::J => (0.0, 1.0),
        };

        Conserved(
             u.0 * vn,
             u.1 * vn + pg * ni,
             u.2 * vn + pg * nj,
             u.3 * vn,
             u.4 * vn + pg * vn)
    }
}




// ============================================================================
impl Add<Conserved> for Conserved {
    type Output = Conserved;
    fn add(self, u: Self) -> Conserved {
        Conserved(self.0 + u.0, self.1 + u.1, self.2 + u.2, self.3 + u.3, self.4 + u.4)
    }
}

impl Sub<Conserved> for Conserved {
    type Output = Self;
    fn sub(self, u: Self) -> Self {
        Self(self.0 - u.0, self.1 - u.1, self.2 - u.2, self.3 - u.3, self.4 - u.4)
    }
}

impl Mul<f64> for Conserved {
    type Output = Self;
    fn mul(self, a: f64) -> Self {
        Self(self.0 * a, self.1 * a, self.2 * a, self.3 * a, self.4 * a)
    }
}

impl Div<f64> for Conserved {
    type Output = Self;
    fn div(self, a: f64) -> Self {
        Self(self.0 / a, self.1 / a, self.2 / a, self.3 / a, self.4 / a)
    }
}




// ============================================================================
pub fn riemann_hlle(pl: Primitive, pr: Primitive, axis: Axis, gamma_law_index: f64) -> Conserved {
    let ul = pl.to_conserved(gamma_law_index);
    let ur = pr.to_conserved(gamma_law_index);
    let fl = pl.flux_vector(axis, gamma_law_index);
    let fr = pr.flux_vector(axis, gamma_law_index);

    let (alm, alp) = pl.outer_wavespeeds(axis, gamma_law_index);
    let (arm, arp) = pr.outer_wavespeeds(axis, gamma_law_index);
    let ap = alp.max(arp).max(0.0);
    let am = alm.min(arm).min(0.0);

    (fl * ap - fr * am - (ul - ur) * ap * am) / (ap - am)
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{riemann_hlle, Conserved, Primitive};
    use crate::error::Error;
    use crate::index_space::Axis;

    #[test]
    fn hlle_flux_of_a_uniform_state_is_the_physical_flux() {
        let p = Primitive::new(1.0, 0.5, -0.25, 0.0, 2.0);
        for axis in Axis::ALL {
            let f = riemann_hlle(p, p, axis, 1.4);
            let g = p.flux_vector(axis, 1.4);
            assert!((f - g).momentum_squared() < 1e-24);
            assert!((f.mass_density() - g.mass_density()).abs() < 1e-12);
        }
    }

    #[test]
    fn primitive_recovery_rejects_negative_pressure() {
        let u = Conserved::from_slice(&[1.0, 2.0, 0.0, 0.0, 1.0]);
        assert!(matches!(u.to_primitive(1.4), Err(Error::NegativeGasPressure(_))));
        let u = Conserved::from_slice(&[-1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(u.to_primitive(1.4), Err(Error::NegativeMassDensity(_))));
    }

    #[test]
    fn conserved_and_primitive_agree() {
        let p = Primitive::new(2.0, 1.0, 0.5, 0.0, 3.0);
        let q = p.to_conserved(5.0 / 3.0).to_primitive(5.0 / 3.0).unwrap();
        assert!((q.gas_pressure() - 3.0).abs() < 1e-12);
        assert!((q.velocity(Axis::J) - 0.5).abs() < 1e-12);
    }
}
