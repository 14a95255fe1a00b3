//! End-to-end graph construction tests.
//!
//! Each test assembles a method with `MethodAssembler`, runs the full build
//! through `GraphBuilder` and checks properties of the finished SSA graph.

use ssagraph::{
    ir::{checker, Constant, Dispatch, Op, ValueKind},
    prelude::*,
};

/// Static method `LTest;->run` with the given signature.
fn static_method(symbols: &mut SymbolTable, signature: Signature) -> u32 {
    symbols.add_method("LTest;", "run", signature)
}

fn verifying() -> BuilderConfig {
    BuilderConfig {
        verify: true,
        ..BuilderConfig::default()
    }
}

/// Assembles and builds a static method with a resolver knowing every symbol.
fn build_static(symbols: &SymbolTable, method: u32, asm: MethodAssembler) -> Result<MethodGraph> {
    let code = asm.finish()?;
    let unit = CompilationUnit::new(symbols, method, &code).with_static(true);
    let resolver = MapResolver::from_symbols(symbols);
    GraphBuilder::new(&unit, &resolver).with_config(verifying()).build()
}

/// The value read by the first `return` in the graph.
fn returned(graph: &MethodGraph) -> Option<ValueId> {
    graph
        .values()
        .find(|v| v.is_in_graph() && v.op() == Some(&Op::Return))
        .and_then(|v| v.input(0))
}

#[test]
fn test_branch_free_method_has_single_body_block() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let callee = symbols.add_method("LTest;", "helper", Signature::new("I", &["I", "I"]));
    let method = static_method(&mut symbols, Signature::new("I", &["I", "I"]));

    let mut asm = MethodAssembler::new(4, 2);
    asm.emit(Opcode::MulInt, Operands::ThreeReg { a: 0, b: 2, c: 3 })?;
    asm.emit(Opcode::AddIntLit, Operands::BinaryLiteral { a: 1, b: 0, literal: 7 })?;
    asm.invoke(Opcode::InvokeStatic, &[0, 1], callee)?;
    asm.emit(Opcode::MoveResult, Operands::OneReg { a: 0 })?;
    asm.ret(Opcode::Return, 0)?;
    let graph = build_static(&symbols, method, asm)?;

    assert_eq!(graph.phi_count(), 0);
    assert_eq!(graph.reverse_post_order().len(), 3);
    let entry = graph.entry();
    let exit = graph.exit().unwrap();
    let body = graph.block(entry).successors()[0];
    assert_eq!(graph.block(body).successors(), &[exit]);

    let result = returned(&graph).unwrap();
    assert!(matches!(graph.value(result).op(), Some(Op::Invoke(call)) if call.method == callee));
    Ok(())
}

#[test]
fn test_diamond_merge_reads_phi() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("I", &[]));

    let mut asm = MethodAssembler::new(1, 0);
    asm.const_int(0, 5)?;
    asm.branch(Opcode::IfEqz, &[0], "join")?;
    asm.const_int(0, 7)?;
    asm.label("join")?;
    asm.ret(Opcode::Return, 0)?;
    let graph = build_static(&symbols, method, asm)?;

    assert_eq!(graph.phi_count(), 1);
    let phi = returned(&graph).unwrap();
    let node = graph.value(phi);
    assert!(node.is_live_phi());
    assert_eq!(node.ty, DataType::Int32);

    let inputs: Vec<_> = node
        .inputs()
        .iter()
        .map(|input| graph.value(*input).constant())
        .collect();
    assert_eq!(inputs, vec![Some(Constant::Int(7)), Some(Constant::Int(5))]);
    Ok(())
}

#[test]
fn test_merge_phis_have_one_input_per_predecessor() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("I", &["I"]));

    // switch on the argument, each case writing v0 and v1
    let mut asm = MethodAssembler::new(3, 1);
    asm.const_int(1, 0)?;
    asm.packed_switch(2, 0, &["zero", "one", "two", "three"])?;
    asm.const_int(0, -1)?;
    asm.branch(Opcode::Goto, &[], "join")?;
    asm.label("zero")?;
    asm.const_int(0, 10)?;
    asm.branch(Opcode::Goto, &[], "join")?;
    asm.label("one")?;
    asm.const_int(0, 11)?;
    asm.const_int(1, 1)?;
    asm.branch(Opcode::Goto, &[], "join")?;
    asm.label("two")?;
    asm.const_int(0, 12)?;
    asm.branch(Opcode::Goto, &[], "join")?;
    asm.label("three")?;
    asm.const_int(0, 13)?;
    asm.label("join")?;
    asm.emit(Opcode::AddInt, Operands::ThreeReg { a: 0, b: 0, c: 1 })?;
    asm.ret(Opcode::Return, 0)?;
    let graph = build_static(&symbols, method, asm)?;

    assert!(graph.phi_count() >= 2);
    for block in graph.blocks().filter(|b| !b.is_loop_header()) {
        for phi in block.phis() {
            assert_eq!(
                graph.value(*phi).inputs().len(),
                block.predecessors().len(),
                "phi {phi} in {}",
                block.id
            );
        }
    }
    checker::verify(&graph)?;
    Ok(())
}

#[test]
fn test_loop_header_phi_has_two_inputs() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("I", &["I"]));

    let mut asm = MethodAssembler::new(3, 1);
    asm.const_int(0, 0)?;
    asm.label("head")?;
    asm.branch(Opcode::IfGe, &[0, 2], "done")?;
    asm.emit(Opcode::AddIntLit, Operands::BinaryLiteral { a: 1, b: 0, literal: 2 })?;
    asm.emit(Opcode::MulInt, Operands::ThreeReg { a: 1, b: 1, c: 1 })?;
    asm.emit(Opcode::XorInt, Operands::ThreeReg { a: 1, b: 1, c: 2 })?;
    asm.emit(Opcode::AddIntLit, Operands::BinaryLiteral { a: 0, b: 0, literal: 1 })?;
    asm.branch(Opcode::Goto, &[], "head")?;
    asm.label("done")?;
    asm.ret(Opcode::Return, 0)?;
    let graph = build_static(&symbols, method, asm)?;

    let header = graph.blocks().find(|b| b.is_loop_header()).unwrap();
    assert_eq!(header.predecessors().len(), 2);
    assert_eq!(header.phis().len(), 1);
    let phi = header.phis()[0];
    assert_eq!(graph.value(phi).inputs().len(), 2);
    assert_eq!(graph.value(graph.value(phi).inputs()[0]).constant(), Some(Constant::Int(0)));
    assert_eq!(returned(&graph), Some(phi));

    let suspend = header.instructions()[0];
    assert_eq!(graph.value(suspend).op(), Some(&Op::SuspendCheck));
    Ok(())
}

#[test]
fn test_int_array_access_is_typed_from_allocation() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let int_array = symbols.add_type("[I");
    let method = static_method(&mut symbols, Signature::new("I", &[]));

    let mut asm = MethodAssembler::new(4, 0);
    asm.const_int(1, 1)?;
    asm.emit(Opcode::NewArray, Operands::TwoRegIndex { a: 0, b: 1, index: int_array })?;
    asm.const_int(2, 0)?;
    asm.const_int(3, 3)?;
    asm.emit(Opcode::Aput, Operands::ThreeReg { a: 3, b: 0, c: 2 })?;
    asm.emit(Opcode::Aget, Operands::ThreeReg { a: 3, b: 0, c: 2 })?;
    asm.ret(Opcode::Return, 3)?;
    let graph = build_static(&symbols, method, asm)?;

    let load = returned(&graph).unwrap();
    assert_eq!(graph.value(load).op(), Some(&Op::ArrayGet));
    assert_eq!(graph.value(load).ty, DataType::Int32);
    let store = graph
        .values()
        .find(|v| v.is_in_graph() && matches!(v.op(), Some(Op::ArraySet { .. })))
        .unwrap();
    assert_eq!(graph.value(store.inputs()[2]).ty, DataType::Int32);
    assert!(!graph
        .values()
        .any(|v| v.is_in_graph() && v.op() == Some(&Op::ArrayGet) && v.ty == DataType::Float32));
    Ok(())
}

#[test]
fn test_float_array_access_switches_to_float_get() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let float_array = symbols.add_type("[F");
    let method = static_method(&mut symbols, Signature::new("F", &["I"]));

    let mut asm = MethodAssembler::new(3, 1);
    asm.emit(Opcode::NewArray, Operands::TwoRegIndex { a: 0, b: 2, index: float_array })?;
    asm.const_int(1, 0)?;
    asm.emit(Opcode::Aget, Operands::ThreeReg { a: 1, b: 0, c: 1 })?;
    asm.ret(Opcode::Return, 1)?;
    let graph = build_static(&symbols, method, asm)?;

    let load = returned(&graph).unwrap();
    assert_eq!(graph.value(load).op(), Some(&Op::ArrayGet));
    assert_eq!(graph.value(load).ty, DataType::Float32);
    Ok(())
}

#[test]
fn test_array_of_unknown_type_is_rejected() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("I", &["Ljava/lang/Object;"]));

    // the array comes from a parameter that is not an array
    let mut asm = MethodAssembler::new(2, 1);
    asm.const_int(0, 0)?;
    asm.emit(Opcode::Aget, Operands::ThreeReg { a: 0, b: 1, c: 0 })?;
    asm.ret(Opcode::Return, 0)?;
    let result = build_static(&symbols, method, asm);
    assert!(matches!(result, Err(Error::InvalidBytecode { .. })));
    Ok(())
}

#[test]
fn test_string_allocation_becomes_factory_call() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let string = symbols.add_type(STRING);
    let init = symbols.add_method(STRING, "<init>", Signature::new("V", &[]));
    let method = static_method(&mut symbols, Signature::new(STRING, &[]));

    let mut asm = MethodAssembler::new(1, 0);
    asm.emit(Opcode::NewInstance, Operands::RegIndex { a: 0, index: string })?;
    asm.invoke(Opcode::InvokeDirect, &[0], init)?;
    asm.ret(Opcode::ReturnObject, 0)?;
    let graph = build_static(&symbols, method, asm)?;

    let result = returned(&graph).unwrap();
    assert!(matches!(
        graph.value(result).op(),
        Some(Op::Invoke(call)) if matches!(call.dispatch, Dispatch::StaticOrDirect { string_init: true, .. })
    ));
    assert!(!graph
        .values()
        .any(|v| v.is_in_graph() && matches!(v.op(), Some(Op::NewInstance { .. }))));
    Ok(())
}

#[test]
fn test_debuggable_build_keeps_string_allocation() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let string = symbols.add_type(STRING);
    let init = symbols.add_method(STRING, "<init>", Signature::new("V", &[]));
    let method = static_method(&mut symbols, Signature::new(STRING, &[]));

    let mut asm = MethodAssembler::new(1, 0);
    asm.emit(Opcode::NewInstance, Operands::RegIndex { a: 0, index: string })?;
    asm.invoke(Opcode::InvokeDirect, &[0], init)?;
    asm.ret(Opcode::ReturnObject, 0)?;
    let code = asm.finish()?;
    let unit = CompilationUnit::new(&symbols, method, &code).with_static(true);
    let resolver = MapResolver::from_symbols(&symbols);
    let config = BuilderConfig {
        debuggable: true,
        ..verifying()
    };
    let graph = GraphBuilder::new(&unit, &resolver).with_config(config).build()?;

    assert!(graph
        .values()
        .any(|v| v.is_in_graph() && matches!(v.op(), Some(Op::NewInstance { is_string: true, .. }))));
    Ok(())
}

#[test]
fn test_unresolved_symbols_do_not_fail_the_build() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let field = symbols.add_field("LOther;", "count", "I");
    let callee = symbols.add_method("LOther;", "compute", Signature::new("I", &["I"]));
    let method = static_method(&mut symbols, Signature::new("I", &[]));

    let mut asm = MethodAssembler::new(1, 0);
    asm.emit(Opcode::Sget, Operands::RegIndex { a: 0, index: field })?;
    asm.invoke(Opcode::InvokeStatic, &[0], callee)?;
    asm.emit(Opcode::MoveResult, Operands::OneReg { a: 0 })?;
    asm.ret(Opcode::Return, 0)?;
    let code = asm.finish()?;
    let unit = CompilationUnit::new(&symbols, method, &code).with_static(true);
    let graph = GraphBuilder::new(&unit, &UnresolvedResolver).with_config(verifying()).build()?;

    assert!(graph
        .values()
        .any(|v| matches!(v.op(), Some(Op::UnresolvedStaticFieldGet { field: f }) if *f == field)));
    let result = returned(&graph).unwrap();
    assert!(matches!(
        graph.value(result).op(),
        Some(Op::Invoke(call)) if call.dispatch == Dispatch::Unresolved
    ));
    Ok(())
}

#[test]
fn test_unsupported_instruction_rejects_method() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("V", &[]));

    let mut asm = MethodAssembler::new(1, 0);
    asm.emit(Opcode::ConstMethodType, Operands::RegIndex { a: 0, index: 0 })?;
    asm.return_void()?;
    let result = build_static(&symbols, method, asm);
    assert!(matches!(
        result,
        Err(Error::UnsupportedInstruction {
            opcode: Opcode::ConstMethodType,
            offset: 0
        })
    ));
    Ok(())
}

#[test]
fn test_wide_argument_must_be_register_pair() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let callee = symbols.add_method("LTest;", "consume", Signature::new("V", &["J"]));
    let method = static_method(&mut symbols, Signature::new("V", &[]));

    let call = |args: Vec<Register>| Operands::Call {
        args,
        index: callee,
        proto: None,
    };
    let cases = [
        // the last register of the frame has no high half
        CodeItem {
            registers: u16::MAX,
            ins: 0,
            outs: 2,
            instructions: vec![
                Instruction::new(0, Opcode::InvokeStatic, call(vec![u16::MAX, u16::MAX])),
                Instruction::new(3, Opcode::ReturnVoid, Operands::None),
            ],
            tries: Vec::new(),
        },
        CodeItem {
            registers: 4,
            ins: 0,
            outs: 2,
            instructions: vec![
                Instruction::new(0, Opcode::ConstWide, Operands::Literal { a: 0, value: 1 }),
                Instruction::new(5, Opcode::InvokeStatic, call(vec![0, 2])),
                Instruction::new(8, Opcode::ReturnVoid, Operands::None),
            ],
            tries: Vec::new(),
        },
    ];

    for code in &cases {
        let unit = CompilationUnit::new(&symbols, method, code).with_static(true);
        let result = GraphBuilder::new(&unit, &UnresolvedResolver).build();
        match result {
            Err(Error::InvalidBytecode { message, .. }) => assert!(message.contains("register pair"), "{message}"),
            other => panic!("expected a rejected call, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn test_finalizer_is_idempotent() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("J", &["I"]));

    let mut asm = MethodAssembler::new(4, 1);
    asm.const_wide(0, 0)?;
    asm.const_int(2, 0)?;
    asm.label("head")?;
    asm.branch(Opcode::IfGe, &[2, 3], "done")?;
    asm.emit(Opcode::IntToLong, Operands::TwoReg { a: 0, b: 2 })?;
    asm.emit(Opcode::AddIntLit, Operands::BinaryLiteral { a: 2, b: 2, literal: 1 })?;
    asm.branch(Opcode::Goto, &[], "head")?;
    asm.label("done")?;
    asm.ret(Opcode::ReturnWide, 0)?;
    let mut graph = build_static(&symbols, method, asm)?;

    let revision = graph.revision();
    SsaFinalizer::new(&symbols, false).run(&mut graph)?;
    assert_eq!(graph.revision(), revision);
    Ok(())
}

#[test]
fn test_budget_rejects_large_branch_free_method() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("V", &[]));

    let mut asm = MethodAssembler::new(1, 0);
    for value in 0..250 {
        asm.const_int(0, value)?;
    }
    asm.return_void()?;
    let code = asm.finish()?;
    let unit = CompilationUnit::new(&symbols, method, &code).with_static(true);
    let config = BuilderConfig {
        budget: Some(CompilationBudget::default()),
        ..BuilderConfig::default()
    };

    let result = GraphBuilder::new(&unit, &UnresolvedResolver).with_config(config).build();
    assert!(matches!(result, Err(Error::SizeBudgetExceeded(_))));

    let (_, stats) = GraphBuilder::new(&unit, &UnresolvedResolver).build_with_stats()?;
    assert_eq!(stats.instructions, 251);
    assert_eq!(stats.branches, 0);
    assert!(stats.code_units > CompilationBudget::default().large_method_code_units);
    Ok(())
}

#[test]
fn test_method_without_code_gets_minimal_graph() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = symbols.add_method("LTest;", "native", Signature::new("J", &["J"]));
    let unit = CompilationUnit::synthetic(&symbols, method).with_static(true);
    let resolver = MapResolver::from_symbols(&symbols);
    let graph = GraphBuilder::new(&unit, &resolver).with_config(verifying()).build()?;

    assert_eq!(graph.phi_count(), 0);
    let parameters = graph
        .values()
        .filter(|v| matches!(v.kind, ValueKind::Parameter { .. }))
        .count();
    assert_eq!(parameters, 1);
    assert!(graph
        .values()
        .any(|v| matches!(v.op(), Some(Op::Invoke(call)) if call.method == method)));
    Ok(())
}

#[test]
fn test_build_methods_keeps_input_order() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let good = static_method(&mut symbols, Signature::new("I", &["I"]));
    let bad = symbols.add_method("LTest;", "bad", Signature::new("V", &["J"]));

    let mut asm = MethodAssembler::new(1, 1);
    asm.ret(Opcode::Return, 0)?;
    let good_code = asm.finish()?;
    let mut asm = MethodAssembler::new(1, 1);
    asm.return_void()?;
    let bad_code = asm.finish()?;

    let units = [
        CompilationUnit::new(&symbols, good, &good_code).with_static(true),
        CompilationUnit::new(&symbols, bad, &bad_code).with_static(true),
        CompilationUnit::new(&symbols, good, &good_code).with_static(true),
    ];
    let resolver = CachedResolver::new(MapResolver::from_symbols(&symbols));
    let results = build_methods(&units, &resolver, &verifying());

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::InvalidBytecode { .. })));
    assert_eq!(results[2].as_ref().map(MethodGraph::method_index).ok(), Some(good));
    Ok(())
}

#[test]
fn test_graph_renders_as_text_and_dot() -> Result<()> {
    let mut symbols = SymbolTable::default();
    let method = static_method(&mut symbols, Signature::new("I", &[]));

    let mut asm = MethodAssembler::new(1, 0);
    asm.const_int(0, 5)?;
    asm.branch(Opcode::IfEqz, &[0], "join")?;
    asm.const_int(0, 7)?;
    asm.label("join")?;
    asm.ret(Opcode::Return, 0)?;
    let graph = build_static(&symbols, method, asm)?;

    let text = graph.to_string();
    assert!(text.contains("Phi"));
    assert!(text.contains("IntConstant 7"));

    let dot = graph.to_dot(Some("LTest;->run()I"));
    assert!(dot.starts_with("digraph MethodGraph {"));
    assert!(dot.contains("LTest;->run()I"));
    assert!(dot.trim_end().ends_with('}'));
    Ok(())
}

const STRING: &str = "Ljava/lang/String;";
