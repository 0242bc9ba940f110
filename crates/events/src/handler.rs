/// Execute an aggregate command in place: decide, then apply each event.
///
/// No persistence and no publication; `CommandDispatcher` in `procura-infra`
/// is the full pipeline. This is what domain tests use to walk an aggregate
/// through its lifecycle.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: procura_core::Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
