pub mod call_string;
pub mod driver;
pub mod flows;
pub mod program_point;
pub mod state_space;
pub mod transition_system;
pub mod worklist;

pub use call_string::CallString;
pub use driver::{FixpointEngine, TransferFunction};
pub use flows::{FlowKind, Flows, Successor};
pub use program_point::{ProgramCtx, ProgramPoint};
pub use state_space::{address_backedge, BackedgePolicy, StateSpace};
pub use transition_system::{ProceduralTransitions, TransitionSystem};
pub use worklist::Worklist;
