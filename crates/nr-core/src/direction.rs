/// Transmission direction of a grant or HARQ process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Dl,
    Ul,
}
