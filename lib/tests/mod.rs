use crate::architecture::{AArch64, Amd64, Architecture, Mips, Mipsel, X86};
use crate::config::{Config, ConfigBuilder, SymbolicAddressPolicy};
use crate::il;
use crate::procedure::{DispatchTable, Outcome};
use crate::state::{Model, State};
use crate::{Error, Value, RC};

mod scanf;

fn amd64_state(config: &Config) -> State {
    State::new(&Amd64::new(), config)
}

#[test]
fn write_then_read() {
    let mut state = amd64_state(&Config::default());
    let address = Value::concrete(0x7000, 64);
    let bytes = vec![
        Value::concrete(0x41, 8),
        Value::scalar("x", 8),
        Value::concrete(0x43, 8),
    ];

    state.write_memory(&address, &bytes).unwrap();
    assert_eq!(
        state
            .read_memory(&address, &Value::concrete(3, 64))
            .unwrap(),
        bytes
    );
}

#[test]
fn failed_procedures_roll_back() {
    let config = Config::default();
    let hooks = DispatchTable::standard(&config);
    let mut state = amd64_state(&config);
    // The last of the 17 bytes lands on a page which can not be written.
    state.memory_mut().set_permissions(
        0x2400,
        0x100,
        crate::memory::MemoryPermissions::READ,
    );
    state.set_register("rsi", Value::concrete(0x2400 - 16, 64));

    let result = hooks.invoke("scanf", &mut state, &Amd64::new());
    assert!(matches!(result, Err(Error::PermissionDenied(0x2400))));

    // The posix cursor did not move, no scalars were created, and nothing
    // was written.
    let posix = state.posix().unwrap();
    assert_eq!(posix.position(0).unwrap(), &Value::concrete(0, 64));
    assert!(posix.symbolic_scalars().is_empty());
    assert!(state.memory().load_bytes(0x2400 - 16, 1).is_err());
    assert!(state.register("rax").is_none());
}

#[test]
fn symbolic_destination_rejected() {
    let config = Config::default();
    let hooks = DispatchTable::standard(&config);
    let mut state = amd64_state(&config);
    state.set_register("rsi", Value::scalar("buffer", 64));

    assert!(matches!(
        hooks.invoke("__isoc99_scanf", &mut state, &Amd64::new()),
        Err(Error::SymbolicAddressUnsupported(_))
    ));
    assert!(state.constraints().is_empty());
    assert_eq!(
        state.posix().unwrap().position(0).unwrap(),
        &Value::concrete(0, 64)
    );
}

#[test]
fn symbolic_destination_concretized() {
    let config = ConfigBuilder::new()
        .symbolic_addresses(SymbolicAddressPolicy::Concretize)
        .build();
    let hooks = DispatchTable::standard(&config);
    let mut state = amd64_state(&config);
    state.set_solver(RC::new(
        Model::new().with("buffer", il::const_(0x5000, 64)),
    ));
    state.set_register("rsi", Value::scalar("buffer", 64));

    let outcome = hooks
        .invoke("__isoc99_scanf", &mut state, &Amd64::new())
        .unwrap();

    // The symbolic pointer itself is returned, constrained to where the
    // bytes were written.
    assert_eq!(outcome, Outcome::Return(Value::scalar("buffer", 64)));
    assert_eq!(
        state.constraints(),
        &[il::Expression::cmpeq(
            il::expr_scalar("buffer", 64),
            il::expr_const(0x5000, 64)
        )
        .unwrap()]
    );
    assert_eq!(state.memory().load_bytes(0x5000, 17).unwrap().len(), 17);
}

#[test]
fn concretize_without_a_solver() {
    let config = ConfigBuilder::new()
        .symbolic_addresses(SymbolicAddressPolicy::Concretize)
        .build();
    let hooks = DispatchTable::standard(&config);
    let mut state = amd64_state(&config);
    state.set_register("rsi", Value::scalar("buffer", 64));

    assert!(matches!(
        hooks.invoke("scanf", &mut state, &Amd64::new()),
        Err(Error::NoSolver)
    ));
}

#[test]
fn every_architecture() {
    let config = ConfigBuilder::new().scanf_length(4).build();
    let hooks = DispatchTable::standard(&config);
    let architectures: Vec<Box<dyn Architecture>> = vec![
        Box::new(Amd64::new()),
        Box::new(AArch64::new()),
        Box::new(Mips::new()),
        Box::new(Mipsel::new()),
        Box::new(X86::new()),
    ];

    for architecture in architectures {
        let calling_convention = architecture.calling_convention();
        let word_size = architecture.word_size();
        let mut state = State::new(architecture.as_ref(), &config);
        let destination = Value::concrete(0x6000, word_size);

        match calling_convention.argument_registers().get(1) {
            Some(register) => state.set_register(register.name(), destination.clone()),
            None => {
                let stack_pointer = architecture.stack_pointer();
                state.set_register(stack_pointer.name(), Value::concrete(0x8000, word_size));
                let slot = 0x8000
                    + (calling_convention.stack_argument_offset()
                        + calling_convention.stack_argument_length())
                        as u64;
                state.memory_mut().store(slot, &destination).unwrap();
            }
        }

        let outcome = hooks
            .invoke("scanf", &mut state, architecture.as_ref())
            .unwrap();
        assert_eq!(outcome, Outcome::Return(destination.clone()));
        assert_eq!(
            state.register(calling_convention.return_register().name()),
            Some(&destination),
            "{}",
            architecture.name()
        );
        assert_eq!(state.memory().load_bytes(0x6000, 4).unwrap().len(), 4);
    }
}

#[cfg(feature = "thread_safe")]
#[test]
fn concurrent_paths() {
    use std::thread;

    let config = Config::default();
    let hooks = RC::new(DispatchTable::standard(&config));
    let architecture: RC<dyn Architecture> = RC::new(Amd64::new());

    let mut root = State::new(architecture.as_ref(), &config);
    root.write_memory(&Value::concrete(0x2000, 64), &Value::from_u8s(&[0; 17]))
        .unwrap();

    let handles = (0..2u64)
        .map(|i| {
            let hooks = hooks.clone();
            let architecture = architecture.clone();
            let mut state = root.clone();
            thread::spawn(move || {
                state.set_register("rsi", Value::concrete(0x2000, 64));
                for _ in 0..=i {
                    hooks
                        .invoke("scanf", &mut state, architecture.as_ref())
                        .unwrap();
                }
                state
            })
        })
        .collect::<Vec<_>>();

    let states = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<State>>();

    assert_eq!(
        states[0].posix().unwrap().position(0).unwrap(),
        &Value::concrete(17, 64)
    );
    assert_eq!(
        states[1].posix().unwrap().position(0).unwrap(),
        &Value::concrete(34, 64)
    );
    assert_ne!(
        states[0].memory().load_bytes(0x2000, 17).unwrap(),
        states[1].memory().load_bytes(0x2000, 17).unwrap()
    );
    // The state both paths forked from is untouched.
    assert_eq!(
        root.memory().load_bytes(0x2000, 17).unwrap(),
        Value::from_u8s(&[0; 17])
    );
    assert_eq!(
        root.posix().unwrap().position(0).unwrap(),
        &Value::concrete(0, 64)
    );
}
