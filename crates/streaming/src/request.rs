/// Identifies one scheduled fetch in a deterministic, stable way.
///
/// Tickets are handed out in increasing order per engine, so a larger ticket
/// always belongs to a newer fetch. Small and copyable so it can travel with
/// the fetch future and back without allocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
