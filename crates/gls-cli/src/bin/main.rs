//! Command-line driver: `run`/`dump` over one or more bytecode images
//! (spec.md §6 "CLI behaviour").

use gls::error::Error;
use gls::image::{format, ConstantKind};
use gls::vm::call;
use gls::{heap, GcConfig, GlsResult, Val, Vm};
use std::env;
use std::fs;
use std::io::Write;

const VERSION: &str = "gls 0.1.0";

fn print_usage() {
    eprintln!("usage: gls run <image-file>... [-- arg...]");
    eprintln!("       gls dump <image-file>...");
}

/// Maps `LOG_LEVEL` (spec.md §6: 0..6, none/fatal/error/warn/info/debug/trace,
/// default 4) onto `log`'s five-level filter; `log` has no distinct "fatal"
/// level, so 1 collapses into `Error` alongside 2.
fn log_level_filter() -> log::LevelFilter {
    let n: u8 = env::var("LOG_LEVEL").ok().and_then(|s| s.parse().ok()).unwrap_or(4);
    match n {
        0 => log::LevelFilter::Off,
        1 | 2 => log::LevelFilter::Error,
        3 => log::LevelFilter::Warn,
        4 => log::LevelFilter::Info,
        5 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

enum Command {
    Run,
    Dump,
}

struct Cli {
    command: Command,
    image_files: Vec<String>,
    program_args: Vec<String>,
}

fn parse_args() -> Result<Cli, String> {
    let args: Vec<String> = env::args().collect();
    let command = match args.get(1).map(String::as_str) {
        Some("run") => Command::Run,
        Some("dump") => Command::Dump,
        Some(other) => return Err(format!("unrecognized command '{other}'")),
        None => return Err("missing command".to_string()),
    };

    let mut image_files = Vec::new();
    let mut program_args = Vec::new();
    let mut rest = &args[2..];
    if let Some(sep) = rest.iter().position(|a| a == "--") {
        program_args = rest[sep + 1..].to_vec();
        rest = &rest[..sep];
    }
    image_files.extend(rest.iter().cloned());

    if image_files.is_empty() {
        return Err("no image file given".to_string());
    }
    Ok(Cli { command, image_files, program_args })
}

/// A best-effort, non-recursive-cycle-safe renderer for a fault value
/// (spec.md §7 "User-visible failure behaviour" prints it after the banner).
fn format_val(vm: &Vm, v: Val) -> String {
    if v.is_fixnum() {
        return v.as_sfix().to_string();
    }
    if v.is_char() {
        return format!("#\\{}", char::from_u32(v.as_char()).unwrap_or('?'));
    }
    if v.is_nil() {
        return "()".to_string();
    }
    if v.is_true() {
        return "#t".to_string();
    }
    if v.is_false() {
        return "#f".to_string();
    }
    if v.is_eof() {
        return "#<eof>".to_string();
    }
    if !v.is_gc_ptr() {
        return format!("#<static {:#x}>", v.as_addr());
    }
    let ty = vm.gc.type_of(v);
    if ty == vm.types.string || ty == vm.types.bytes {
        let bytes = unsafe { heap::bytes_slice(v) };
        return String::from_utf8_lossy(bytes).into_owned();
    }
    if ty == vm.types.symbol {
        let name = heap::field_val(v, heap::SYMBOL_NAME_OFFSET);
        let bytes = unsafe { heap::bytes_slice(name) };
        return String::from_utf8_lossy(bytes).into_owned();
    }
    if ty == vm.types.pair {
        let mut parts = Vec::new();
        let mut cur = v;
        loop {
            if cur.is_nil() {
                break;
            }
            if !cur.is_gc_ptr() || vm.gc.type_of(cur) != vm.types.pair {
                parts.push(format!(". {}", format_val(vm, cur)));
                break;
            }
            parts.push(format_val(vm, heap::car(cur)));
            cur = heap::cdr(cur);
        }
        return format!("({})", parts.join(" "));
    }
    format!("#<object type={ty}>")
}

/// Prints the exact trace format spec.md §7 requires, returning an error if
/// the write to `stderr` itself fails (the CLI's own exit-code-2 case).
fn report_uncaught(vm: &Vm, err: &Error) -> std::io::Result<()> {
    let mut out = std::io::stderr().lock();
    writeln!(out, "Uncaught exception:")?;
    if let Some(fault) = err.fault {
        if !fault.is_nil() {
            writeln!(out, "{}", format_val(vm, fault))?;
        }
    }
    for frame in &err.frames {
        writeln!(out, "at {} ({}:{}): {}", frame.function_name, frame.file_name, frame.line, frame.message)?;
    }
    let omitted = err.omitted();
    if omitted > 0 {
        writeln!(out, "at ... ({omitted} omitted)")?;
    }
    Ok(())
}

/// Runs the body of `run`, reporting through the live `vm` on failure so the
/// fault value and frame trace render with real symbol/type names (spec.md
/// §7). Returns the process exit code: 0, 1 (uncaught error), or 2 (the
/// error report itself failed to write).
fn run(cli: &Cli) -> i32 {
    let mut vm = match gls::new_vm(GcConfig::default()) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("gls: {e}");
            return 1;
        }
    };

    let body = (|| -> GlsResult<()> {
        let mut program_args = Vec::with_capacity(cli.program_args.len());
        for a in &cli.program_args {
            program_args.push(heap::alloc_string(&mut vm.gc, &vm.types, a.as_bytes())?);
        }
        vm.program_args = program_args;

        for path in &cli.image_files {
            let bytes = fs::read(path).map_err(|e| Error::load(format!("cannot open {path}: {e}")))?;
            let index = vm.load_image(&bytes)?;
            vm.run_start(index)?;
        }

        let main_sym = vm.symtab.intern(&mut vm.gc, &vm.types, b"main")?;
        if !gls::symtab::SymbolTable::is_undefined(main_sym) {
            let main_fn = gls::symtab::SymbolTable::value(main_sym);
            let mut rets = [Val::fixnum(0)];
            call(&mut vm, main_fn, 0, &[], 1, &mut rets)?;
        }
        Ok(())
    })();

    match body {
        Ok(()) => 0,
        Err(e) => match report_uncaught(&vm, &e) {
            Ok(()) => 1,
            Err(write_err) => {
                eprintln!("gls: failed to write error report: {write_err}");
                2
            }
        },
    }
}

fn mnemonic_and_operand_len(op: u8) -> (&'static str, usize) {
    match op {
        format::OP_NOP => ("nop", 0),
        format::OP_DROP => ("drop", 0),
        format::OP_RET => ("ret", 1),
        format::OP_BR => ("br", 4),
        format::OP_BR_IF_NOT => ("br-if-not", 4),
        format::OP_LDC => ("ldc", 4),
        format::OP_SYM_DEREF => ("sym-deref", 0),
        format::OP_LAMBDA => ("lambda", 6),
        format::OP_CALL => ("call", 2),
        format::OP_LOCAL_REF => ("local-ref", 1),
        format::OP_LOCAL_SET => ("local-set", 1),
        format::OP_ARG_REF => ("arg-ref", 1),
        format::OP_RESTARG_REF => ("restarg-ref", 1),
        format::OP_THIS_REF => ("this-ref", 0),
        format::OP_CLOSURE_REF => ("closure-ref", 1),
        _ => ("?", 0),
    }
}

fn dump_one(path: &str) -> GlsResult<()> {
    let bytes = fs::read(path).map_err(|e| Error::load(format!("cannot open {path}: {e}")))?;
    let mut vm = gls::new_vm(GcConfig::default())?;
    let index = vm.load_image(&bytes)?;
    let image = &vm.images[index as usize];

    println!("image {path}: version {}", image.version);

    println!("constants ({}):", image.constants.len());
    for (i, c) in image.constants.iter().enumerate() {
        match c {
            ConstantKind::Lambda { code_index, captured } => {
                println!("  [{i}] lambda code={code_index} captured={captured:?}")
            }
            ConstantKind::List { elements } => println!("  [{i}] list {elements:?}"),
            ConstantKind::Direct { lo, hi } => {
                let raw = (*lo as u64) | ((*hi as u64) << 32);
                println!("  [{i}] direct {raw:#018x}")
            }
            ConstantKind::Symbol { name } => println!("  [{i}] symbol {:?}", String::from_utf8_lossy(name)),
            ConstantKind::Str { bytes } => println!("  [{i}] string {:?}", String::from_utf8_lossy(bytes)),
        }
    }

    println!("codes ({}):", image.codes.len());
    let buffer = unsafe { heap::bytes_slice(image.buffer) };
    for (i, block) in image.codes.iter().enumerate() {
        println!("  [{i}] max_stack={} locals={} len={}", block.max_stack, block.locals, block.code_len);
        let code = &buffer[block.code_offset as usize..block.code_offset as usize + block.code_len as usize];
        let mut ip = 0usize;
        while ip < code.len() {
            let op = code[ip];
            let (name, operand_len) = mnemonic_and_operand_len(op);
            let operand_bytes = &code[ip + 1..ip + 1 + operand_len];
            println!("    {ip:4}: {name} {operand_bytes:?}");
            ip += 1 + operand_len;
        }
    }

    println!("bindings ({}):", image.bindings.len());
    for b in &image.bindings {
        println!("  symbol[{}] = constant[{}]", b.symbol_const_index, b.binding_const_index);
    }

    match image.start {
        Some(idx) => println!("start: code[{idx}]"),
        None => println!("start: none"),
    }
    Ok(())
}

fn dump(cli: &Cli) -> i32 {
    for path in &cli.image_files {
        if let Err(e) = dump_one(path) {
            eprintln!("gls: {e}");
            return 1;
        }
    }
    0
}

fn main() {
    env_logger::Builder::new().filter_level(log_level_filter()).init();
    log::info!("{VERSION}");

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("gls: {e}");
            print_usage();
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Command::Run => run(&cli),
        Command::Dump => dump(&cli),
    };
    std::process::exit(code);
}
