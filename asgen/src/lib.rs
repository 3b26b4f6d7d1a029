/*!
Library surface of the generator binary: the engine and the command
line plumbing. The integration test crate drives full runs through
`engine::Engine` instead of spawning the executable.
*/

pub mod cmd;
pub mod engine;
