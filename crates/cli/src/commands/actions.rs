use concierge_agent::ActionDefinition;

/// Pretty-printed JSON list of every action the oracle may select, with parameter schemas.
pub fn run() -> String {
    serde_json::to_string_pretty(&ActionDefinition::all()).unwrap_or_else(|error| {
        format!("{{\"error\":\"failed to serialize action definitions: {error}\"}}")
    })
}
