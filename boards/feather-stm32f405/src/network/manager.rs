//! Network stack bring-up

use defmt::info;
use embassy_net::Stack;

/// Wait for DHCP to configure the stack and log the lease
pub async fn wait_for_config(stack: &Stack<'_>) {
    info!("Waiting for DHCP...");
    stack.wait_config_up().await;
    info!("Network is UP!");

    if let Some(config) = stack.config_v4() {
        let ip = config.address.address();
        let octets = ip.octets();
        info!(
            "IP: {}.{}.{}.{}",
            octets[0], octets[1], octets[2], octets[3]
        );

        if let Some(gateway) = config.gateway {
            let gw_octets = gateway.octets();
            info!(
                "Gateway: {}.{}.{}.{}",
                gw_octets[0], gw_octets[1], gw_octets[2], gw_octets[3]
            );
        }

        for dns in &config.dns_servers {
            let dns_octets = dns.octets();
            info!(
                "DNS: {}.{}.{}.{}",
                dns_octets[0], dns_octets[1], dns_octets[2], dns_octets[3]
            );
        }
    }
}
