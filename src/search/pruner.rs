use crate::search::active_list::ActiveList;
use crate::search::token::TokenLattice;

/// Beam policy applied to the active list after scoring. Implementations may
/// only shrink the list.
pub trait Pruner: Send {
    fn allocate(&mut self) {}

    fn deallocate(&mut self) {}

    fn start_recognition(&mut self) {}

    fn stop_recognition(&mut self) {}

    fn prune(&mut self, active_list: ActiveList, lattice: &TokenLattice) -> ActiveList;
}

/// Applies the active list's own relative and absolute beams.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplePruner;

impl Pruner for SimplePruner {
    fn prune(&mut self, active_list: ActiveList, lattice: &TokenLattice) -> ActiveList {
        active_list.purge(lattice)
    }
}
