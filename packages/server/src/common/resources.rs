use serde::{Deserialize, Serialize};

/// A three-dimensional resource amount. All arithmetic is integer;
/// there are no fractional resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceVector {
    pub cpu: i64,
    pub ram: i64,
    pub gpu: i64,
}

impl ResourceVector {
    pub fn new(cpu: i64, ram: i64, gpu: i64) -> Self {
        Self { cpu, ram, gpu }
    }

    pub fn is_non_negative(&self) -> bool {
        self.cpu >= 0 && self.ram >= 0 && self.gpu >= 0
    }

    /// Component-wise feasibility: does `self` fit inside `free`?
    pub fn fits_within(&self, free: ResourceVector) -> bool {
        self.cpu <= free.cpu && self.ram <= free.ram && self.gpu <= free.gpu
    }

    pub fn plus(&self, other: ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu: self.cpu + other.cpu,
            ram: self.ram + other.ram,
            gpu: self.gpu + other.gpu,
        }
    }

    pub fn minus(&self, other: ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu: self.cpu - other.cpu,
            ram: self.ram - other.ram,
            gpu: self.gpu - other.gpu,
        }
    }

    /// Sum of a set of requests, e.g. the running set of a cluster.
    pub fn total<I: IntoIterator<Item = ResourceVector>>(requests: I) -> ResourceVector {
        requests
            .into_iter()
            .fold(ResourceVector::default(), |acc, r| acc.plus(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_is_component_wise() {
        let free = ResourceVector::new(4, 8, 1);
        assert!(ResourceVector::new(4, 8, 1).fits_within(free));
        assert!(ResourceVector::new(0, 0, 0).fits_within(free));
        assert!(!ResourceVector::new(5, 1, 0).fits_within(free));
        assert!(!ResourceVector::new(1, 9, 0).fits_within(free));
        assert!(!ResourceVector::new(1, 1, 2).fits_within(free));
    }

    #[test]
    fn total_folds_component_wise() {
        let total = ResourceVector::total(vec![
            ResourceVector::new(1, 2, 0),
            ResourceVector::new(3, 4, 1),
        ]);
        assert_eq!(total, ResourceVector::new(4, 6, 1));
    }

    #[test]
    fn free_is_capacity_minus_running() {
        let capacity = ResourceVector::new(16, 32, 4);
        let running = ResourceVector::new(4, 8, 1);
        assert_eq!(capacity.minus(running), ResourceVector::new(12, 24, 3));
    }

    #[test]
    fn non_negative_check() {
        assert!(ResourceVector::new(0, 0, 0).is_non_negative());
        assert!(!ResourceVector::new(-1, 0, 0).is_non_negative());
    }
}
