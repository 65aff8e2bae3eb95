//! End-to-end scheduler scenarios.
//!
//! Each scenario writes a BUILD.lua into a fresh project directory and runs
//! builds against an on-disk store in the same directory. Re-running a
//! scenario constructs a fresh scheduler over the same store, which is
//! exactly what consecutive CLI invocations see. Recipes append their name
//! to `exec.log` on every execution, making "did it re-run" observable.

use std::fs;
use std::path::{Path, PathBuf};

use rebuild_core::Store;
use rebuild_engine::recipe::RecipeState;
use rebuild_engine::{BuildConfig, EngineError, Scheduler};
use tempfile::TempDir;

fn write_build_file(temp: &TempDir, template: &str) {
    let contents = template.replace("__ROOT__", &temp.path().to_string_lossy());
    fs::write(temp.path().join("BUILD.lua"), contents).unwrap();
}

fn scheduler(temp: &TempDir, config: BuildConfig) -> Scheduler {
    let store = Store::open(temp.path().join("store")).unwrap();
    let scheduler = Scheduler::new(store, config, temp.path().to_path_buf()).unwrap();
    scheduler.load_build_file(&temp.path().join("BUILD.lua")).unwrap();
    scheduler
}

/// One build invocation with a fresh scheduler, as a new process would run.
fn build(temp: &TempDir, target: &str) -> Result<PathBuf, EngineError> {
    scheduler(temp, BuildConfig::new()).build(target)
}

/// Names of recipes that have executed so far, in execution order.
fn executions(temp: &TempDir) -> Vec<String> {
    fs::read_to_string(temp.path().join("exec.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

fn count(names: &[String], wanted: &str) -> usize {
    names.iter().filter(|name| *name == wanted).count()
}

fn count_traces(temp: &TempDir) -> usize {
    fn walk(dir: &Path, acc: &mut usize) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, acc);
                } else {
                    *acc += 1;
                }
            }
        }
    }
    let mut total = 0;
    walk(&temp.path().join("store/traces"), &mut total);
    total
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

const TWO_LEAF_DAG: &str = r#"
local log = "__ROOT__/exec.log"

local function mark(name)
    local f = assert(io.open(log, "a"))
    f:write(name .. "\n")
    f:close()
end

local function write_out(name, text)
    local f = assert(io.open(rebuild.output_dir() .. "/" .. name, "w"))
    f:write(text)
    f:close()
end

local function slurp(path)
    local f = assert(io.open(path, "r"))
    local text = f:read("a")
    f:close()
    return text
end

rebuild.register_target("L1", "build_l1")
rebuild.register_target("L2", "build_l2")
rebuild.register_target("R", "build_r")

function build_l1()
    mark("L1")
    write_out("L1.out", "A")
end

function build_l2()
    mark("L2")
    write_out("L2.out", "B")
end

function build_r()
    mark("R")
    local l1 = rebuild.depend_on("L1")
    local l2 = rebuild.depend_on("L2")
    write_out("R.out", slurp(l1 .. "/L1.out") .. slurp(l2 .. "/L2.out"))
end
"#;

#[test]
fn clean_build_of_two_leaf_dag() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, TWO_LEAF_DAG);

    let out = build(&temp, "R").unwrap();

    assert_eq!(out, temp.path().join("outputs/R"));
    assert_eq!(read(&out.join("R.out")), "AB");

    let runs = executions(&temp);
    assert_eq!(runs.len(), 3, "three recipe executions, got {:?}", runs);
    for target in ["L1", "L2", "R"] {
        assert_eq!(count(&runs, target), 1, "{} should run exactly once", target);
    }
    assert_eq!(count_traces(&temp), 3);
}

#[test]
fn noop_rebuild_executes_nothing() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, TWO_LEAF_DAG);

    build(&temp, "R").unwrap();
    let after_first = executions(&temp);
    assert_eq!(after_first.len(), 3);

    let out = build(&temp, "R").unwrap();
    assert_eq!(read(&out.join("R.out")), "AB");
    assert_eq!(executions(&temp), after_first, "second build must execute nothing");
    assert_eq!(count_traces(&temp), 3, "no new traces on a no-op rebuild");
}

#[test]
fn repeated_build_in_one_process_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, TWO_LEAF_DAG);

    let sched = scheduler(&temp, BuildConfig::new());
    let first = sched.build("R").unwrap();
    let second = sched.build("R").unwrap();
    assert_eq!(first, second);
    assert_eq!(executions(&temp).len(), 3);
}

#[test]
fn leaf_change_reexecutes_leaf_and_root_only() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, TWO_LEAF_DAG);
    build(&temp, "R").unwrap();
    assert_eq!(executions(&temp).len(), 3);

    // Change what L1's recipe writes; its code hash (and only its) changes.
    write_build_file(&temp, &TWO_LEAF_DAG.replace(r#"write_out("L1.out", "A")"#, r#"write_out("L1.out", "A'")"#));

    let out = build(&temp, "R").unwrap();
    assert_eq!(read(&out.join("R.out")), "A'B");

    let runs = executions(&temp);
    assert_eq!(count(&runs, "L1"), 2, "L1 must re-execute");
    assert_eq!(count(&runs, "R"), 2, "R must re-execute");
    assert_eq!(count(&runs, "L2"), 1, "L2 must not re-execute");
}

const HEADER_CHAIN: &str = r#"
local log = "__ROOT__/exec.log"

local function mark(name)
    local f = assert(io.open(log, "a"))
    f:write(name .. "\n")
    f:close()
end

local function slurp(path)
    local f = assert(io.open(path, "r"))
    local text = f:read("a")
    f:close()
    return text
end

local function write_out(name, text)
    local f = assert(io.open(rebuild.output_dir() .. "/" .. name, "w"))
    f:write(text)
    f:close()
end

rebuild.register_target("L1", "build_l1")
rebuild.register_target("L2", "build_l2")
rebuild.register_target("R", "build_r")

function build_l1()
    mark("L1")
    write_out("h.txt", "original header")
end

function build_l2()
    mark("L2")
    local l1 = rebuild.depend_on("L1")
    local header = l1 .. "/h.txt"
    rebuild.register_dep(header)
    write_out("L2.out", "compiled: " .. slurp(header))
end

function build_r()
    mark("R")
    local l2 = rebuild.depend_on("L2")
    write_out("R.out", "linked: " .. slurp(l2 .. "/L2.out"))
end
"#;

#[test]
fn header_change_propagates_without_rerunning_producer() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, HEADER_CHAIN);
    let out = build(&temp, "R").unwrap();
    assert_eq!(read(&out.join("R.out")), "linked: compiled: original header");
    assert_eq!(executions(&temp).len(), 3);

    // Edit the header in place, as an external change to L1's output.
    fs::write(temp.path().join("outputs/L1/h.txt"), "patched header").unwrap();

    let out = build(&temp, "R").unwrap();
    assert_eq!(read(&out.join("R.out")), "linked: compiled: patched header");

    let runs = executions(&temp);
    assert_eq!(count(&runs, "L2"), 2, "L2 must re-execute");
    assert_eq!(count(&runs, "R"), 2, "R must re-execute");
    assert_eq!(count(&runs, "L1"), 1, "L1 must not re-execute");
}

const DIAMOND: &str = r#"
local log = "__ROOT__/exec.log"

local function mark(name)
    local f = assert(io.open(log, "a"))
    f:write(name .. "\n")
    f:close()
end

local function slurp(path)
    local f = assert(io.open(path, "r"))
    local text = f:read("a")
    f:close()
    return text
end

local function write_out(name, text)
    local f = assert(io.open(rebuild.output_dir() .. "/" .. name, "w"))
    f:write(text)
    f:close()
end

rebuild.register_target("A", "build_a")
rebuild.register_target("B", "build_b")
rebuild.register_target("C", "build_c")
rebuild.register_target("D", "build_d")

function build_d()
    mark("D")
    write_out("D.out", "d")
end

function build_b()
    mark("B")
    local d = rebuild.depend_on("D")
    write_out("B.out", "b(" .. slurp(d .. "/D.out") .. ")")
end

function build_c()
    mark("C")
    local d = rebuild.depend_on("D")
    write_out("C.out", "c(" .. slurp(d .. "/D.out") .. ")")
end

function build_a()
    mark("A")
    local b = rebuild.depend_on("B")
    local c = rebuild.depend_on("C")
    write_out("A.out", slurp(b .. "/B.out") .. "+" .. slurp(c .. "/C.out"))
end
"#;

#[test]
fn diamond_executes_shared_dependency_once() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, DIAMOND);

    let out = build(&temp, "A").unwrap();
    assert_eq!(read(&out.join("A.out")), "b(d)+c(d)");

    let runs = executions(&temp);
    assert_eq!(runs.len(), 4, "each recipe exactly once, got {:?}", runs);
    for target in ["A", "B", "C", "D"] {
        assert_eq!(count(&runs, target), 1, "{} should run exactly once", target);
    }
}

const FAILURE_ISOLATION: &str = r#"
local log = "__ROOT__/exec.log"

local function mark(name)
    local f = assert(io.open(log, "a"))
    f:write(name .. "\n")
    f:close()
end

rebuild.register_target("P", "build_p")
rebuild.register_target("Q", "build_q")
rebuild.register_target("X", "build_x")

function build_p()
    mark("P")
    local f = assert(io.open(rebuild.output_dir() .. "/P.out", "w"))
    f:write("p is fine")
    f:close()
end

function build_q()
    mark("Q")
    error("q exploded")
end

function build_x()
    mark("X")
    rebuild.depend_on("P")
    rebuild.depend_on("Q")
    local f = assert(io.open(rebuild.output_dir() .. "/X.out", "w"))
    f:write("never reached")
    f:close()
end
"#;

#[test]
fn failure_names_the_failing_target_and_leaves_siblings_materialized() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, FAILURE_ISOLATION);

    let sched = scheduler(&temp, BuildConfig::new());
    let err = sched.build("X").unwrap_err();
    match err {
        EngineError::BuildFailed { target } => assert_eq!(target, "Q"),
        other => panic!("expected BuildFailed, got {:?}", other),
    }

    // P's outputs survive for post-mortem.
    assert_eq!(read(&temp.path().join("outputs/P/P.out")), "p is fine");
    // X never completed or failed: it was suspended on Q when the build died.
    assert_eq!(sched.recipe_state("X"), Some(RecipeState::Suspended));
    assert_eq!(sched.recipe_state("Q"), Some(RecipeState::Failed));
    assert!(!temp.path().join("outputs/X/X.out").exists());
    // Only P recorded a trace.
    assert_eq!(count_traces(&temp), 1);
}

const CYCLE: &str = r#"
rebuild.register_target("A", "build_a")
rebuild.register_target("B", "build_b")

function build_a()
    rebuild.depend_on("B")
end

function build_b()
    rebuild.depend_on("A")
end
"#;

#[test]
fn dependency_cycle_is_reported() {
    let temp = TempDir::new().unwrap();
    write_build_file(&temp, CYCLE);

    match build(&temp, "A").unwrap_err() {
        EngineError::DependencyCycle { targets } => {
            assert_eq!(targets, vec!["A".to_string(), "B".to_string()]);
        }
        other => panic!("expected DependencyCycle, got {:?}", other),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        r#"
rebuild.register_target("narcissus", "build_narcissus")
function build_narcissus()
    rebuild.depend_on("narcissus")
end
"#,
    );

    match build(&temp, "narcissus").unwrap_err() {
        EngineError::DependencyCycle { targets } => {
            assert_eq!(targets, vec!["narcissus".to_string()]);
        }
        other => panic!("expected DependencyCycle, got {:?}", other),
    }
}

#[test]
fn depend_on_all_returns_paths_in_call_order() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        &TWO_LEAF_DAG.replace(
            r#"    local l1 = rebuild.depend_on("L1")
    local l2 = rebuild.depend_on("L2")"#,
            r#"    local paths = rebuild.depend_on_all({"L1", "L2"})
    local l1 = paths[1]
    local l2 = paths[2]"#,
        ),
    );

    let out = build(&temp, "R").unwrap();
    assert_eq!(read(&out.join("R.out")), "AB");
    assert_eq!(executions(&temp).len(), 3);

    // And a no-op rebuild stays a no-op.
    build(&temp, "R").unwrap();
    assert_eq!(executions(&temp).len(), 3);
}

#[test]
fn dynamic_dependency_on_unknown_target_fails_requester() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        r#"
rebuild.register_target("wanting", "build_wanting")
function build_wanting()
    rebuild.depend_on("never-registered")
end
"#,
    );

    match build(&temp, "wanting").unwrap_err() {
        EngineError::BuildFailed { target } => assert_eq!(target, "wanting"),
        other => panic!("expected BuildFailed, got {:?}", other),
    }
}

#[test]
fn sys_captures_output_and_exit_codes() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        r#"
rebuild.register_target("shell", "build_shell")
function build_shell()
    local result = rebuild.sys({"/bin/sh", "-c", "printf from-sys"})
    if result.exit_code ~= 0 then
        error("unexpected exit: " .. result.exit_code)
    end

    -- A non-zero exit is reported, not raised.
    local probe = rebuild.sys({"/bin/sh", "-c", "printf grumble >&2; exit 7"})
    if probe.exit_code ~= 7 then
        error("expected exit 7, got " .. probe.exit_code)
    end
    if probe.stderr ~= "grumble" then
        error("expected stderr capture, got " .. probe.stderr)
    end

    local f = assert(io.open(rebuild.output_dir() .. "/sys.out", "w"))
    f:write(result.stdout)
    f:close()
end
"#,
    );

    let out = build(&temp, "shell").unwrap();
    assert_eq!(read(&out.join("sys.out")), "from-sys");
}

#[test]
fn sys_defaults_to_the_recipe_scratch_directory() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        r#"
rebuild.register_target("scratch", "build_scratch")
function build_scratch()
    rebuild.sys({"/bin/sh", "-c", "pwd > cwd.txt"})
    local f = assert(io.open(rebuild.temp_dir() .. "/cwd.txt", "r"))
    local cwd = f:read("a")
    f:close()
    local out = assert(io.open(rebuild.output_dir() .. "/cwd.txt", "w"))
    out:write(cwd)
    out:close()
end
"#,
    );

    let out = build(&temp, "scratch").unwrap();
    let cwd = read(&out.join("cwd.txt"));
    assert!(cwd.contains("/tmp/scratch_"), "sys should run in the scratch dir, got {}", cwd);
}

#[test]
fn deptool_exposes_hashed_tool_handles() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        r#"
rebuild.register_target("tooluser", "build_tooluser")
function build_tooluser()
    local tool = rebuild.deptool("sh")
    if #tool.binary_hash ~= 64 then
        error("binary hash should be 64 hex chars")
    end
    if tool.module_hash ~= string.rep("0", 64) then
        error("module hash should be zero without a tools/sh.lua")
    end
    local f = assert(io.open(rebuild.output_dir() .. "/tool.txt", "w"))
    f:write(tool.binary_path)
    f:close()
end
"#,
    );

    let out = build(&temp, "tooluser").unwrap();
    assert!(read(&out.join("tool.txt")).ends_with("/sh"));
}

#[test]
fn config_change_invalidates_cached_results() {
    let temp = TempDir::new().unwrap();
    write_build_file(
        &temp,
        r#"
local log = "__ROOT__/exec.log"

rebuild.register_target("cfg", "build_cfg")
function build_cfg()
    local f = assert(io.open(log, "a"))
    f:write("cfg\n")
    f:close()
    local out = assert(io.open(rebuild.output_dir() .. "/cfg.out", "w"))
    out:write(rebuild.config.profile or "default")
    out:close()
end
"#,
    );

    let mut release = BuildConfig::new();
    release.set("profile", "release");

    scheduler(&temp, release.clone()).build("cfg").unwrap();
    assert_eq!(executions(&temp).len(), 1);

    // Same configuration: cached.
    scheduler(&temp, release).build("cfg").unwrap();
    assert_eq!(executions(&temp).len(), 1);

    // Different configuration: new request key, re-executed.
    let mut debug = BuildConfig::new();
    debug.set("profile", "debug");
    let out = scheduler(&temp, debug).build("cfg").unwrap();
    assert_eq!(executions(&temp).len(), 2);
    assert_eq!(read(&out.join("cfg.out")), "debug");
}

#[test]
fn glob_and_registered_sources_invalidate_on_change() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/a.c"), "int a;").unwrap();
    fs::write(temp.path().join("src/b.c"), "int b;").unwrap();
    write_build_file(
        &temp,
        r#"
local log = "__ROOT__/exec.log"

rebuild.register_target("scan", "build_scan")
function build_scan()
    local f = assert(io.open(log, "a"))
    f:write("scan\n")
    f:close()

    local sources = rebuild.glob("src/*.c")
    local listing = ""
    for _, path in ipairs(sources) do
        rebuild.register_dep(path)
        listing = listing .. path .. "\n"
    end
    local out = assert(io.open(rebuild.output_dir() .. "/sources.txt", "w"))
    out:write(listing)
    out:close()
end
"#,
    );

    let out = build(&temp, "scan").unwrap();
    assert_eq!(read(&out.join("sources.txt")), "src/a.c\nsrc/b.c\n");
    assert_eq!(executions(&temp).len(), 1);

    // Untouched sources: cached.
    build(&temp, "scan").unwrap();
    assert_eq!(executions(&temp).len(), 1);

    // Editing a registered source invalidates the trace.
    fs::write(temp.path().join("src/a.c"), "int a = 1;").unwrap();
    build(&temp, "scan").unwrap();
    assert_eq!(executions(&temp).len(), 2);
}
