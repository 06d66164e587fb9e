//! The machine state of a single path.
//!
//! A `State` holds registers, a copy-on-write paged memory, the path
//! constraints collected so far, and a set of named plugins such as the
//! posix model. Cloning a state forks the path: memory pages are shared until
//! written, and every other component is copied.
//!
//! Procedures do not touch memory through `Memory` directly. They go through
//! `read_memory` and `write_memory`, which accept symbolic addresses and
//! lengths and resolve them according to the state's
//! `SymbolicAddressPolicy`. Both the address and the length of an access are
//! resolved before any constraint is recorded, so a failed access leaves the
//! path constraints as they were.

use crate::architecture::Architecture;
use crate::config::{Config, SymbolicAddressPolicy};
use crate::il;
use crate::memory::paged::Memory;
use crate::memory::Value;
use crate::platform::posix::{self, Posix};
use crate::Error;
use crate::RC;
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::collections::BTreeMap;

mod plugin;
mod solver;

pub use self::plugin::Plugin;
pub use self::solver::{Model, Solver};

/// The state of one path.
#[derive(Clone, Debug)]
pub struct State {
    registers: FxHashMap<String, Value>,
    memory: Memory,
    constraints: Vec<il::Expression>,
    plugins: BTreeMap<String, Box<dyn Plugin>>,
    symbolic_addresses: SymbolicAddressPolicy,
    solver: Option<RC<dyn Solver>>,
}

impl State {
    /// Create an empty state for `architecture`.
    ///
    /// Memory takes the architecture's endianness, and a posix plugin is
    /// registered with stdin backed by the content given in `config`.
    pub fn new(architecture: &dyn Architecture, config: &Config) -> State {
        let mut plugins: BTreeMap<String, Box<dyn Plugin>> = BTreeMap::new();
        plugins.insert(
            posix::PLUGIN_NAME.to_string(),
            Box::new(Posix::with_stdin(config.stdin.clone())),
        );

        State {
            registers: FxHashMap::default(),
            memory: Memory::new(architecture.endian()),
            constraints: Vec::new(),
            plugins,
            symbolic_addresses: config.symbolic_addresses,
            solver: None,
        }
    }

    /// Get the value of a register, if it has been set.
    pub fn register(&self, name: &str) -> Option<&Value> {
        self.registers.get(name)
    }

    pub fn set_register<S: Into<String>>(&mut self, name: S, value: Value) {
        self.registers.insert(name.into(), value);
    }

    pub fn registers(&self) -> &FxHashMap<String, Value> {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn symbolic_addresses(&self) -> SymbolicAddressPolicy {
        self.symbolic_addresses
    }

    pub fn set_symbolic_addresses(&mut self, policy: SymbolicAddressPolicy) {
        self.symbolic_addresses = policy;
    }

    pub fn solver(&self) -> Option<&RC<dyn Solver>> {
        self.solver.as_ref()
    }

    /// Set the solver used to concretize symbolic values.
    pub fn set_solver(&mut self, solver: RC<dyn Solver>) {
        self.solver = Some(solver);
    }

    /// The path constraints of this state.
    pub fn constraints(&self) -> &[il::Expression] {
        &self.constraints
    }

    /// Add a constraint to this state.
    ///
    /// The constraint must be a 1-bit expression, which holds when it is
    /// equal to 1. A constant constraint which does not hold is kept, making
    /// this state unsatisfiable.
    pub fn add_constraint(&mut self, constraint: il::Expression) -> Result<(), Error> {
        if constraint.bits() != 1 {
            return Err(Error::Sort);
        }
        if constraint.all_constants() {
            if il::eval(&constraint)?.is_one() {
                return Ok(());
            }
            self.constraints.push(il::Expression::cmpeq(
                il::expr_const(1, 1),
                il::expr_const(0, 1),
            )?);
            return Ok(());
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Reduce a value to a concrete u64.
    ///
    /// Concrete values are returned as they are. Symbolic values are handled
    /// by this state's `SymbolicAddressPolicy`: rejected, or evaluated by the
    /// solver, in which case the value is constrained to the chosen answer.
    pub fn concretize(&mut self, value: &Value) -> Result<u64, Error> {
        let mut choices = Vec::new();
        let result = self.solve(value, &mut choices)?;
        self.commit(choices)?;
        Ok(result)
    }

    /// Pick a concrete value for `value` without constraining this state.
    ///
    /// The choice made for a symbolic value is pushed onto `choices`. Choices
    /// already there are assumed to hold when solving.
    fn solve(&self, value: &Value, choices: &mut Vec<il::Expression>) -> Result<u64, Error> {
        let expression = match *value {
            Value::Concrete(ref constant) => {
                return constant.value_u64().ok_or(Error::TooManyAddressBits);
            }
            Value::Symbolic(ref expression) => expression,
        };

        if self.symbolic_addresses == SymbolicAddressPolicy::Reject {
            return Err(Error::SymbolicAddressUnsupported(expression.clone()));
        }

        let solver = self.solver.as_ref().ok_or(Error::NoSolver)?;
        let constraints: Cow<[il::Expression]> = if choices.is_empty() {
            Cow::Borrowed(self.constraints.as_slice())
        } else {
            Cow::Owned(self.constraints.iter().chain(choices.iter()).cloned().collect())
        };
        let constant = solver
            .eval(expression, &constraints)?
            .ok_or(Error::Unsatisfiable)?;
        if constant.bits() != expression.bits() {
            return Err(Error::ArchitectureMismatch {
                expected: expression.bits(),
                found: constant.bits(),
            });
        }
        let result = constant.value_u64().ok_or(Error::TooManyAddressBits)?;

        debug!("concretized {} to 0x{:x}", expression, result);

        choices.push(il::Expression::cmpeq(expression.clone(), constant.into())?);
        Ok(result)
    }

    fn commit(&mut self, choices: Vec<il::Expression>) -> Result<(), Error> {
        for choice in choices {
            self.add_constraint(choice)?;
        }
        Ok(())
    }

    /// Read `length` bytes starting at `address`.
    pub fn read_memory(&mut self, address: &Value, length: &Value) -> Result<Vec<Value>, Error> {
        let mut choices = Vec::new();
        let address = self.solve(address, &mut choices)?;
        let length = self.solve(length, &mut choices)?;
        let length = usize::try_from(length).map_err(|_| Error::TooManyAddressBits)?;
        trace!("read_memory 0x{:x} {}", address, length);
        let bytes = self.memory.load_bytes(address, length)?;
        self.commit(choices)?;
        Ok(bytes)
    }

    /// Write bytes starting at `address`. Every byte must be 8 bits wide.
    pub fn write_memory(&mut self, address: &Value, bytes: &[Value]) -> Result<(), Error> {
        let mut choices = Vec::new();
        let address = self.solve(address, &mut choices)?;
        trace!("write_memory 0x{:x} {}", address, bytes.len());
        self.memory.store_bytes(address, bytes)?;
        self.commit(choices)
    }

    /// Register a plugin under `name`, replacing any plugin already there.
    pub fn set_plugin<S: Into<String>>(&mut self, name: S, plugin: Box<dyn Plugin>) {
        self.plugins.insert(name.into(), plugin);
    }

    /// Get the plugin registered under `name`, if it is a `P`.
    pub fn plugin<P: Plugin>(&self, name: &str) -> Option<&P> {
        self.plugins
            .get(name)
            .and_then(|plugin| plugin.as_any().downcast_ref::<P>())
    }

    pub fn plugin_mut<P: Plugin>(&mut self, name: &str) -> Option<&mut P> {
        self.plugins
            .get_mut(name)
            .and_then(|plugin| plugin.as_any_mut().downcast_mut::<P>())
    }

    pub fn posix(&self) -> Result<&Posix, Error> {
        self.plugin::<Posix>(posix::PLUGIN_NAME)
            .ok_or_else(|| Error::PluginMissing(posix::PLUGIN_NAME.to_string()))
    }

    pub fn posix_mut(&mut self) -> Result<&mut Posix, Error> {
        self.plugin_mut::<Posix>(posix::PLUGIN_NAME)
            .ok_or_else(|| Error::PluginMissing(posix::PLUGIN_NAME.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::Amd64;
    use crate::config::ConfigBuilder;

    fn state(policy: SymbolicAddressPolicy) -> State {
        let config = ConfigBuilder::new().symbolic_addresses(policy).build();
        State::new(&Amd64::new(), &config)
    }

    #[test]
    fn concrete_memory() {
        let mut state = state(SymbolicAddressPolicy::Reject);
        let address = Value::concrete(0x1000, 64);
        state
            .write_memory(&address, &Value::from_u8s(b"abc"))
            .unwrap();
        assert_eq!(
            state
                .read_memory(&address, &Value::concrete(3, 64))
                .unwrap(),
            Value::from_u8s(b"abc")
        );
    }

    #[test]
    fn rejects_symbolic_addresses() {
        let mut state = state(SymbolicAddressPolicy::Reject);
        let address = Value::scalar("p", 64);
        assert!(matches!(
            state.write_memory(&address, &Value::from_u8s(b"a")),
            Err(Error::SymbolicAddressUnsupported(_))
        ));
        assert!(state.constraints().is_empty());
    }

    #[test]
    fn concretize_needs_a_solver() {
        let mut state = state(SymbolicAddressPolicy::Concretize);
        assert!(matches!(
            state.concretize(&Value::scalar("p", 64)),
            Err(Error::NoSolver)
        ));
    }

    #[test]
    fn concretize_records_a_constraint() {
        let mut state = state(SymbolicAddressPolicy::Concretize);
        state.set_solver(RC::new(Model::new().with("p", il::const_(0x3000, 64))));

        let address = Value::scalar("p", 64)
            .add(&Value::concrete(0x10, 64))
            .unwrap();
        state
            .write_memory(&address, &Value::from_u8s(b"z"))
            .unwrap();

        assert_eq!(
            state.memory().load(0x3010, 8).unwrap(),
            Value::concrete(b'z' as u64, 8)
        );
        assert_eq!(state.constraints().len(), 1);
        assert_eq!(
            state.constraints()[0],
            il::Expression::cmpeq(address.expression(), il::expr_const(0x3010, 64)).unwrap()
        );
    }

    #[test]
    fn concretize_unsatisfiable() {
        let mut state = state(SymbolicAddressPolicy::Concretize);
        state.set_solver(RC::new(Model::new().with("p", il::const_(0x3000, 64))));
        state
            .add_constraint(
                il::Expression::cmpeq(il::expr_scalar("p", 64), il::expr_const(0x4000, 64))
                    .unwrap(),
            )
            .unwrap();

        assert!(matches!(
            state.concretize(&Value::scalar("p", 64)),
            Err(Error::Unsatisfiable)
        ));
    }

    #[test]
    fn constant_constraints() {
        let mut state = state(SymbolicAddressPolicy::Reject);
        state
            .add_constraint(
                il::Expression::cmpeq(il::expr_const(1, 8), il::expr_const(1, 8)).unwrap(),
            )
            .unwrap();
        assert!(state.constraints().is_empty());

        state
            .add_constraint(
                il::Expression::cmpeq(il::expr_const(1, 8), il::expr_const(2, 8)).unwrap(),
            )
            .unwrap();
        assert_eq!(state.constraints().len(), 1);

        assert!(state.add_constraint(il::expr_scalar("wide", 8)).is_err());
    }

    #[test]
    fn forks_are_independent() {
        let mut state = state(SymbolicAddressPolicy::Reject);
        state.set_register("rax", Value::concrete(1, 64));

        let mut fork = state.clone();
        fork.set_register("rax", Value::concrete(2, 64));
        fork.posix_mut().unwrap().read(0, 4).unwrap();

        assert_eq!(state.register("rax"), Some(&Value::concrete(1, 64)));
        assert_eq!(
            state.posix().unwrap().position(0).unwrap(),
            &Value::concrete(0, 64)
        );
        assert_eq!(
            fork.posix().unwrap().position(0).unwrap(),
            &Value::concrete(4, 64)
        );
    }

    #[test]
    fn missing_plugin() {
        let mut state = state(SymbolicAddressPolicy::Reject);
        state.plugins.clear();
        assert!(matches!(state.posix(), Err(Error::PluginMissing(_))));
    }

    #[test]
    fn symbolic_lengths_are_concretized() {
        let mut state = state(SymbolicAddressPolicy::Concretize);
        state.set_solver(RC::new(Model::new().with("n", il::const_(3, 64))));
        let address = Value::concrete(0x1000, 64);
        state
            .write_memory(&address, &Value::from_u8s(b"abcd"))
            .unwrap();

        assert_eq!(
            state
                .read_memory(&address, &Value::scalar("n", 64))
                .unwrap(),
            Value::from_u8s(b"abc")
        );
        assert_eq!(
            state.constraints(),
            &[il::Expression::cmpeq(il::expr_scalar("n", 64), il::expr_const(3, 64)).unwrap()]
        );
    }

    #[test]
    fn symbolic_lengths_are_rejected() {
        let mut state = state(SymbolicAddressPolicy::Reject);
        let address = Value::concrete(0x1000, 64);
        state
            .write_memory(&address, &Value::from_u8s(b"abcd"))
            .unwrap();

        assert!(matches!(
            state.read_memory(&address, &Value::scalar("n", 64)),
            Err(Error::SymbolicAddressUnsupported(_))
        ));
        assert!(state.constraints().is_empty());
    }

    #[test]
    fn failed_lengths_leave_no_constraints() {
        let mut state = state(SymbolicAddressPolicy::Concretize);
        // The address can be solved, the length can not.
        state.set_solver(RC::new(Model::new().with("p", il::const_(0x1000, 64))));
        state
            .write_memory(&Value::concrete(0x1000, 64), &Value::from_u8s(b"abcd"))
            .unwrap();

        assert!(matches!(
            state.read_memory(&Value::scalar("p", 64), &Value::scalar("n", 64)),
            Err(Error::EvalScalar(_))
        ));
        assert!(state.constraints().is_empty());

        // A failed load records nothing either.
        assert!(matches!(
            state.read_memory(&Value::scalar("p", 64), &Value::concrete(5, 64)),
            Err(Error::UnmappedRead(0x1004))
        ));
        assert!(state.constraints().is_empty());
    }
}
