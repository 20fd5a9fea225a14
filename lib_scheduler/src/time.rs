/// Simulated time is dimensionless but, by convention across this workspace,
/// one unit equals one millisecond (matching the reference implementation).
/// It is represented as `f64` so that `Exp`-distributed delays and
/// fractional-millisecond latencies compose without a fixed-point scheme.
pub type Time = f64;

/// Wraps a `Time` so it can be used as a `BinaryHeap`/`Ord` key. `Time` is an
/// `f64` and therefore only `PartialOrd`; the scheduler never produces `NaN`
/// deadlines (all delays come from non-negative sums and exponential
/// samples), so a total order via `partial_cmp().unwrap()` is safe here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeKey(pub Time);

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).expect("simulated time must never be NaN")
    }
}
