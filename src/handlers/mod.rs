// Handlers are grouped by the authentication tier they are mounted under:
// public (no token) and protected (bearer token). The generic CRUD handlers
// in `crud` land in either tier depending on the model's policy.

pub mod crud;
pub mod protected;
pub mod public;
