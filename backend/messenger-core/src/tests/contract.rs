use crate::contract::{Contract, InvokeContract, MessageContract, Mode};

struct Log;

impl MessageContract for Log {
    const KEY: &'static str = "log";
    type Payload = String;
}

struct Add;

impl InvokeContract for Add {
    const KEY: &'static str = "add";
    type Request = (i64, i64);
    type Response = i64;
}

/// **VALUE**: Verifies typed and by-name declarations land in the table in order.
#[test]
fn given_typed_declarations_when_building_contract_then_modes_are_recorded() {
    // GIVEN/WHEN: A mixed contract
    let contract = Contract::new()
        .message::<Log>()
        .invoke::<Add>()
        .declare("reset", Mode::Message);

    // THEN: Each key has its mode, in declaration order
    assert_eq!(contract.mode("log"), Some(Mode::Message));
    assert_eq!(contract.mode("add"), Some(Mode::Invoke));
    assert_eq!(contract.mode("missing"), None);
    let keys: Vec<_> = contract.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["log", "add", "reset"]);
    assert_eq!(contract.keys_with(Mode::Message).collect::<Vec<_>>(), vec!["log", "reset"]);
}

/// **VALUE**: Verifies re-declaring a key keeps a single entry with the latest mode.
#[test]
fn given_duplicate_key_when_declared_then_last_mode_wins() {
    // GIVEN/WHEN: "add" declared twice
    let contract = Contract::new()
        .invoke::<Add>()
        .declare("add", Mode::Message);

    // THEN: One entry, message mode
    assert_eq!(contract.len(), 1);
    assert_eq!(contract.mode("add"), Some(Mode::Message));
}

#[test]
fn given_mode_when_displayed_then_uses_lowercase_name() {
    assert_eq!(Mode::Message.to_string(), "message");
    assert_eq!(Mode::Invoke.to_string(), "invoke");
}
