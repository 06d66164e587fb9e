use crate::architecture::{Amd64, Architecture};
use crate::config::Config;
use crate::il;
use crate::memory::Value;
use crate::procedure::{DispatchTable, Outcome};
use crate::state::State;
use crate::Error;

/// An amd64 call to `__isoc99_scanf("%s", buf)` with `buf` at 0x2000.
fn scanf_0x2000() -> Result<(State, Outcome), Error> {
    let config = Config::default();
    let hooks = DispatchTable::standard(&config);
    let architecture = Amd64::new();

    let mut state = State::new(&architecture, &config);
    state.set_register("rdi", Value::concrete(0x1000, 64));
    state.set_register("rsi", Value::concrete(0x2000, 64));
    state.set_register("rsp", Value::concrete(0x7fff_0000, 64));

    let outcome = hooks.invoke("__isoc99_scanf", &mut state, &architecture)?;

    Ok((state, outcome))
}

#[test]
fn scanf_returns_its_destination() {
    let (state, outcome) = scanf_0x2000().unwrap();

    assert_eq!(outcome, Outcome::Return(Value::concrete(0x2000, 64)));
    assert_eq!(
        state.register(Amd64::new().calling_convention().return_register().name()),
        Some(&Value::concrete(0x2000, 64))
    );
}

#[test]
fn scanf_stores_stdin() {
    let (mut state, _) = scanf_0x2000().unwrap();

    let stored = state
        .read_memory(&Value::concrete(0x2000, 64), &Value::concrete(17, 64))
        .unwrap();
    let read = state
        .posix()
        .unwrap()
        .symbolic_scalars()
        .iter()
        .map(|scalar| Value::Symbolic(il::Expression::scalar(scalar.clone())))
        .collect::<Vec<Value>>();

    assert_eq!(stored.len(), 17);
    assert_eq!(stored, read);
    assert_eq!(
        state.posix().unwrap().position(0).unwrap(),
        &Value::concrete(17, 64)
    );
    // Nothing past the 17 bytes was touched.
    assert!(state.memory().load_bytes(0x2000 + 17, 1).is_err());
}

#[test]
fn scanf_twice() {
    let (mut state, _) = scanf_0x2000().unwrap();
    let first = state.memory().load_bytes(0x2000, 17).unwrap();

    DispatchTable::standard(&Config::default())
        .invoke("scanf", &mut state, &Amd64::new())
        .unwrap();
    let second = state.memory().load_bytes(0x2000, 17).unwrap();

    // Each call consumes fresh input.
    assert!(first.iter().all(|byte| !second.contains(byte)));
    assert_eq!(state.posix().unwrap().symbolic_scalars().len(), 34);
}
