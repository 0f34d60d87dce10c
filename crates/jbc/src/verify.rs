//! Abstract stack-depth analysis. The operand stack depth at every instruction must be the same
//! along every path reaching it; exception handlers are entered with exactly the thrown reference
//! on the stack.
use crate::method::{MalformedKind, Method};

/// Compute the maximum operand stack depth of the method, failing if any instruction can be
/// reached with two different depths, pops more than is available, or falls off the end.
pub fn max_stack(method: &Method) -> std::result::Result<usize, MalformedKind> {
    let instructions = method.instructions();
    let Some(first) = instructions.first() else {
        return Err(MalformedKind::Empty);
    };
    let mut depths: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut worklist = Vec::new();

    record(0, 0, first.offset, &mut depths, &mut worklist)?;
    for handler in method.handlers() {
        if let Some(index) = method.index_of(handler.handler) {
            record(index, 1, handler.handler, &mut depths, &mut worklist)?;
        }
    }

    let mut max = 0;
    while let Some(index) = worklist.pop() {
        let instr = &instructions[index];
        let depth = depths[index].unwrap_or_default();
        let (pops, pushes) = instr.op_code.stack_effect();
        if depth < pops {
            return Err(MalformedKind::StackUnderflow {
                offset: instr.offset,
            });
        }

        let out = depth - pops + pushes;
        max = max.max(depth).max(out);

        if instr.op_code.falls_through() {
            if index + 1 == instructions.len() {
                return Err(MalformedKind::FallsOffEnd {
                    offset: instr.offset,
                });
            }
            record(
                index + 1,
                out,
                instructions[index + 1].offset,
                &mut depths,
                &mut worklist,
            )?;
        }

        for target in instr.op_code.branch_targets() {
            // Targets were validated before this pass runs.
            if let Some(target_index) = method.index_of(target) {
                record(target_index, out, target, &mut depths, &mut worklist)?;
            }
        }
    }

    Ok(max)
}

fn record(
    index: usize,
    depth: usize,
    offset: u32,
    depths: &mut [Option<usize>],
    worklist: &mut Vec<usize>,
) -> std::result::Result<(), MalformedKind> {
    match depths[index] {
        None => {
            depths[index] = Some(depth);
            worklist.push(index);
            Ok(())
        }
        Some(expected) if expected != depth => Err(MalformedKind::StackDepthMismatch {
            offset,
            expected,
            actual: depth,
        }),
        Some(_) => Ok(()),
    }
}
