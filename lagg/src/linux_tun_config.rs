use anyhow::{bail, Context, Result};
use std::net::Ipv4Addr;
use std::process::Command;

fn run(cmd: &str, args: &[String]) -> Result<String> {
    let out = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("failed to spawn {cmd}"))?;

    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();

    if !out.status.success() {
        bail!("{cmd} failed ({}): {}{}", out.status, stdout, stderr);
    }

    Ok(format!("{}{}", stdout, stderr))
}

fn ip(args: &[String]) -> Result<String> {
    run("ip", args)
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// `ip route replace <destination>/32 dev <ifname>`
fn host_route_args(destination: Ipv4Addr, ifname: &str) -> Vec<String> {
    args(&["route", "replace", &format!("{destination}/32"), "dev", ifname])
}

/// Bring the TUN device up and route `destination` into it.
pub fn configure_linux_tun(ifname: &str, mtu: u16, destination: Ipv4Addr) -> Result<()> {
    ip(&args(&["link", "set", "dev", ifname, "up"])).with_context(|| {
        format!("failed to bring interface '{ifname}' up (ip link set dev ... up)")
    })?;

    // Best-effort; the device was created with this MTU already.
    if let Err(e) = ip(&args(&["link", "set", "dev", ifname, "mtu", &mtu.to_string()])) {
        tracing::warn!("failed to set MTU via ip: {e}");
    }

    ip(&host_route_args(destination, ifname))
        .with_context(|| format!("failed to route {destination} via '{ifname}'"))?;

    tracing::info!("Routed {destination}/32 via '{ifname}'");
    Ok(())
}
