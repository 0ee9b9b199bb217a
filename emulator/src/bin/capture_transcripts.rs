use std::io;

#[allow(dead_code)]
#[path = "../grammar.rs"]
mod grammar;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Sweep)?;
    record_profile(TranscriptProfile::Capacity)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::with_transcript(profile)?;
    match profile {
        TranscriptProfile::Sweep => record_sweep(&mut session),
        TranscriptProfile::Capacity => record_capacity(&mut session),
    }
}

fn record_sweep(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("attach 0 3 1000 2000")?;
    let _ = session.handle_command("attach 1 4 544 2400 0")?;
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("run 40")?;
    for angle in [0, 45, 90, 135, 180] {
        let _ = session.handle_command(&format!("write 0 {angle}"))?;
        let _ = session.handle_command(&format!("write 1 {}", 180 - angle))?;
        let _ = session.handle_command("run 20")?;
    }
    let _ = session.handle_command("write-us 0 2500")?;
    let _ = session.handle_command("read 0")?;
    let _ = session.handle_command("detach 1")?;
    let _ = session.handle_command("run 40")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_capacity(session: &mut Session) -> io::Result<()> {
    for handle in 0..session::SERVO_HANDLES {
        let _ = session.handle_command(&format!("attach {handle} {}", handle + 2))?;
    }
    let _ = session.handle_command("run 20")?;
    let _ = session.handle_command("detach 2")?;
    let _ = session.handle_command("attach 4 6")?;
    let _ = session.handle_command("status")?;
    for handle in 0..session::SERVO_HANDLES {
        let _ = session.handle_command(&format!("detach {handle}"))?;
    }
    let _ = session.handle_command("run 20")?;
    let _ = session.handle_command("status")?;
    Ok(())
}
