//! Goals module - domain models, the goal registry and the epoch board.

mod goal_board;
mod goals_model;
mod goals_service;
mod goals_traits;


pub use goal_board::GoalBoard;
pub use goals_model::{Goal, GoalEpoch, GoalFields, GoalSlot};
pub use goals_service::GoalRegistry;
pub use goals_traits::GoalRepositoryTrait;
