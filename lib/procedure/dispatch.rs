//! Mapping symbols to procedures.

use crate::architecture::Architecture;
use crate::calling_convention::CallingConvention;
use crate::config::Config;
use crate::procedure::{libc, ArgumentKind, Call, Outcome, Procedure};
use crate::state::State;
use crate::Error;
use crate::RC;
use log::{debug, trace};
use rustc_hash::FxHashMap;

/// A procedure bound to a symbol, with the signature it declared when it was
/// registered.
#[derive(Clone, Debug)]
pub struct ProcedureBinding {
    symbol: String,
    procedure: RC<dyn Procedure>,
    signature: Vec<ArgumentKind>,
}

impl ProcedureBinding {
    pub fn new<S: Into<String>>(symbol: S, procedure: RC<dyn Procedure>) -> ProcedureBinding {
        let signature = procedure.signature();
        ProcedureBinding {
            symbol: symbol.into(),
            procedure,
            signature,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn procedure(&self) -> &dyn Procedure {
        self.procedure.as_ref()
    }

    pub fn signature(&self) -> &[ArgumentKind] {
        &self.signature
    }

    /// Run the bound procedure against `state`, writing the return value on
    /// `Outcome::Return`.
    ///
    /// The state is not restored on error. See `DispatchTable::invoke`.
    pub fn call(
        &self,
        state: &mut State,
        calling_convention: &CallingConvention,
    ) -> Result<Outcome, Error> {
        trace!("call {}", self.symbol);
        let outcome = {
            let mut call = Call::new(&self.symbol, state, calling_convention, &self.signature);
            self.procedure.invoke(&mut call)?
        };
        if let Outcome::Return(ref value) = outcome {
            calling_convention.set_return_value(state, value.clone())?;
        }
        Ok(outcome)
    }
}

/// The table of simulated procedures, keyed by symbol.
#[derive(Clone, Debug, Default)]
pub struct DispatchTable {
    bindings: FxHashMap<String, ProcedureBinding>,
}

impl DispatchTable {
    /// Create an empty `DispatchTable`.
    pub fn new() -> DispatchTable {
        DispatchTable::default()
    }

    /// Create a `DispatchTable` holding the libc catalog.
    pub fn standard(config: &Config) -> DispatchTable {
        let mut table = DispatchTable::new();
        table.register_aliases(
            &["scanf", "__isoc99_scanf"],
            RC::new(libc::Scanf::new(&config.scanf)),
        );
        table.register("read", libc::Read::new(config.max_read_length));
        table.register("write", libc::Write);
        table.register_aliases(&["exit", "_exit"], RC::new(libc::Exit));
        table
    }

    /// Bind `procedure` to `symbol`, replacing any procedure already bound to
    /// it.
    pub fn register<S, P>(&mut self, symbol: S, procedure: P)
    where
        S: Into<String>,
        P: Procedure + 'static,
    {
        let symbol = symbol.into();
        self.bindings.insert(
            symbol.clone(),
            ProcedureBinding::new(symbol, RC::new(procedure)),
        );
    }

    /// Bind one procedure to several symbols.
    pub fn register_aliases(&mut self, symbols: &[&str], procedure: RC<dyn Procedure>) {
        for symbol in symbols {
            self.bindings.insert(
                symbol.to_string(),
                ProcedureBinding::new(*symbol, procedure.clone()),
            );
        }
    }

    pub fn lookup(&self, symbol: &str) -> Option<&ProcedureBinding> {
        self.bindings.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.bindings.contains_key(symbol)
    }

    /// Every bound symbol, in no particular order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(|symbol| symbol.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Run the procedure bound to `symbol` against `state`.
    ///
    /// A symbol with no procedure fails with `Error::UnknownSymbol`, leaving
    /// `state` untouched, so the engine can fall back to executing the real
    /// function. If the procedure fails, `state` is restored to what it was
    /// before the call.
    pub fn invoke(
        &self,
        symbol: &str,
        state: &mut State,
        architecture: &dyn Architecture,
    ) -> Result<Outcome, Error> {
        let binding = self
            .lookup(symbol)
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))?;
        let calling_convention = architecture.calling_convention();

        let checkpoint = state.clone();
        match binding.call(state, &calling_convention) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                debug!("{} failed, rolling back: {}", symbol, error);
                *state = checkpoint;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::Amd64;
    use crate::memory::Value;

    #[derive(Debug)]
    struct Constant(u64);

    impl Procedure for Constant {
        fn signature(&self) -> Vec<ArgumentKind> {
            Vec::new()
        }

        fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
            Ok(Outcome::Return(call.word(self.0)))
        }
    }

    #[derive(Debug)]
    struct Greedy;

    impl Procedure for Greedy {
        fn signature(&self) -> Vec<ArgumentKind> {
            vec![ArgumentKind::Pointer]
        }

        fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
            call.argument(1)?;
            Ok(Outcome::Return(call.word(0)))
        }
    }

    #[test]
    fn standard_catalog() {
        let table = DispatchTable::standard(&Config::default());
        for symbol in &["scanf", "__isoc99_scanf", "read", "write", "exit", "_exit"] {
            assert!(table.contains(symbol), "{}", symbol);
        }
        assert_eq!(table.len(), 6);
        assert_eq!(
            table.lookup("__isoc99_scanf").unwrap().signature(),
            &[ArgumentKind::FormatString, ArgumentKind::Pointer]
        );
        assert!(table.lookup("printf").is_none());
    }

    #[test]
    fn unknown_symbol() {
        let table = DispatchTable::standard(&Config::default());
        let architecture = Amd64::new();
        let mut state = State::new(&architecture, &Config::default());

        assert!(matches!(
            table.invoke("strlen", &mut state, &architecture),
            Err(Error::UnknownSymbol(ref symbol)) if symbol == "strlen"
        ));
        assert!(state.register("rax").is_none());
    }

    #[test]
    fn return_value_is_written() {
        let mut table = DispatchTable::new();
        table.register("answer", Constant(42));
        let architecture = Amd64::new();
        let mut state = State::new(&architecture, &Config::default());

        let outcome = table.invoke("answer", &mut state, &architecture).unwrap();
        assert_eq!(outcome, Outcome::Return(Value::concrete(42, 64)));
        assert_eq!(state.register("rax"), Some(&Value::concrete(42, 64)));
    }

    #[test]
    fn undeclared_arguments() {
        let mut table = DispatchTable::new();
        table.register("greedy", Greedy);
        let architecture = Amd64::new();
        let mut state = State::new(&architecture, &Config::default());
        state.set_register("rdi", Value::concrete(1, 64));
        state.set_register("rsi", Value::concrete(2, 64));

        assert!(matches!(
            table.invoke("greedy", &mut state, &architecture),
            Err(Error::ArgumentResolutionFailure { index: 1, .. })
        ));
        assert!(state.register("rax").is_none());
    }

    #[test]
    fn registering_replaces() {
        let mut table = DispatchTable::new();
        table.register("f", Constant(1));
        table.register("f", Constant(2));
        let architecture = Amd64::new();
        let mut state = State::new(&architecture, &Config::default());

        table.invoke("f", &mut state, &architecture).unwrap();
        assert_eq!(state.register("rax"), Some(&Value::concrete(2, 64)));
        assert_eq!(table.symbols().collect::<Vec<&str>>(), vec!["f"]);
    }
}
