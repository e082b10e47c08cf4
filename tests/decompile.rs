use rpn_vm::prelude::*;

const PIPELINE: &str = "READ A\n\
                        READ B\n\
                        SUM\n\
                        CONST float64 3.14\n\
                        PROD\n\
                        DUP\n\
                        WRITE C\n\
                        CONST float32 0.5\n\
                        POW\n";

fn assign_pipeline_types(vm: &mut Interpreter<'_>) {
    vm.set_input_type("A", TypeDescriptor::FLOAT32).unwrap();
    vm.set_input_type("B", TypeDescriptor::FLOAT32).unwrap();
    vm.set_output_type("C", TypeDescriptor::FLOAT32).unwrap();
}

#[test]
fn decompile_reconstructs_the_source_text() {
    let mut vm = Interpreter::new();
    vm.extract_variables(PIPELINE).unwrap();
    assign_pipeline_types(&mut vm);
    // the pipeline deliberately leaves one operand on the stack
    let _ = vm.compile(PIPELINE);

    assert_eq!(vm.decompile().unwrap(), PIPELINE);
}

#[test]
fn decompile_recompiles_byte_identically() {
    let mut first = Interpreter::new();
    first.extract_variables(PIPELINE).unwrap();
    assign_pipeline_types(&mut first);
    let _ = first.compile(PIPELINE);

    let text = first.decompile().unwrap();

    let mut second = Interpreter::new();
    second.extract_variables(&text).unwrap();
    assign_pipeline_types(&mut second);
    let _ = second.compile(&text);

    assert_eq!(first.code(), second.code());
    assert_eq!(first.data_area(), second.data_area());
}

#[test]
fn well_formed_program_round_trips() {
    let program = "READ A\n\
                   READ B\n\
                   SUM\n\
                   CONST float64 3.14\n\
                   PROD\n\
                   WRITE C\n";
    let mut first = Interpreter::new();
    first.extract_variables(program).unwrap();
    assign_pipeline_types(&mut first);
    first.compile(program).unwrap();

    let text = first.decompile().unwrap();
    assert_eq!(text, program);

    let mut second = Interpreter::new();
    second.extract_variables(&text).unwrap();
    assign_pipeline_types(&mut second);
    second.compile(&text).unwrap();

    assert_eq!(first.code(), second.code());
    assert_eq!(first.data_area(), second.data_area());
}

#[test]
fn cast_decompiles_with_its_target_type() {
    let program = "READ X\nCAST int8\nWRITE Y\n";
    let mut vm = Interpreter::new();
    vm.extract_variables(program).unwrap();
    vm.set_input_type("X", TypeDescriptor::INT32).unwrap();
    vm.set_output_type("Y", TypeDescriptor::INT8).unwrap();
    vm.compile(program).unwrap();

    assert_eq!(vm.decompile().unwrap(), program);
}

#[test]
fn aliased_output_reads_decompile_to_the_output_name() {
    let program = "READ P\nWRITE Q\nREAD Q\nWRITE R\n";
    let mut vm = Interpreter::new();
    vm.extract_variables(program).unwrap();
    for name in ["Q", "R"] {
        vm.set_output_type(name, TypeDescriptor::UINT16).unwrap();
    }
    vm.set_input_type("P", TypeDescriptor::UINT16).unwrap();
    vm.compile(program).unwrap();

    assert_eq!(vm.decompile().unwrap(), program);
}

#[test]
fn typed_sketch_names_the_signature() {
    let program = "READ A\nREAD B\nSUM\nWRITE C\n";
    let mut vm = Interpreter::new();
    vm.extract_variables(program).unwrap();
    assign_pipeline_types(&mut vm);
    vm.compile(program).unwrap();

    let sketch = vm.decompile_with_types().unwrap();
    assert!(sketch.contains("SUM (float32,float32 => float32)"));
    assert!(sketch.contains("READ A ( => float32)"));
}

#[test]
fn empty_stream_decompiles_to_nothing() {
    let mut vm = Interpreter::new();
    vm.extract_variables("").unwrap();
    vm.compile("").unwrap();
    assert_eq!(vm.decompile().unwrap(), "");
}
