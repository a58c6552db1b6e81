mod invariants;
mod templates_flow;
